//! User Login State Machine
//!
//! A login form that validates input, submits credentials, locks itself
//! after repeated failures and terminates once credentials are accepted.
//!
//! Key concepts:
//! - Per-state data carried by a tagged enum
//! - Hooks driving follow-up changes
//! - A countdown built from scheduled updates
//! - Terminal states and the closed lifecycle
//!
//! Run with: cargo run --example user_login

use fsm_rx::core::{Node, StateData};
use fsm_rx::engine::{EnterChanges, HookContext, HookResult, UpdateChanges};
use fsm_rx::export::DebugLogView;
use fsm_rx::graph::{GraphBuilder, StateEntry};
use fsm_rx::{state_enum, Engine, FsmConfig, FsmService};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

state_enum! {
    enum Login {
        AwaitingInput = "awaitingInput",
        FrontendValidationCheck = "frontendValidationCheck",
        Error = "error",
        SubmittingCredentials = "submittingCredentials",
        Locked = "locked",
        CredentialsAccepted = "credentialsAccepted",
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
enum Form {
    AwaitingInput { username: String, password: String },
    FrontendValidationCheck { username: String, password: String },
    Error { username: String, message: String },
    SubmittingCredentials { username: String, password: String },
    Locked { username: String, seconds_remaining: u32 },
    CredentialsAccepted { username: String },
}

impl StateData for Form {
    type State = Login;

    fn state(&self) -> Login {
        match self {
            Self::AwaitingInput { .. } => Login::AwaitingInput,
            Self::FrontendValidationCheck { .. } => Login::FrontendValidationCheck,
            Self::Error { .. } => Login::Error,
            Self::SubmittingCredentials { .. } => Login::SubmittingCredentials,
            Self::Locked { .. } => Login::Locked,
            Self::CredentialsAccepted { .. } => Login::CredentialsAccepted,
        }
    }
}

const PASSWORD: &str = "hunter2";

fn validate(ctx: &mut HookContext<Form>, changes: &EnterChanges<Form>) -> HookResult {
    let Some(Form::FrontendValidationCheck { username, password }) = changes.entering.data() else {
        return Err("unexpected data in validation".into());
    };
    if username.is_empty() || password.is_empty() {
        ctx.change_state(Form::Error {
            username: username.clone(),
            message: "login and password are required".to_string(),
        });
    } else {
        ctx.change_state(Form::SubmittingCredentials {
            username: username.clone(),
            password: password.clone(),
        });
    }
    Ok(())
}

fn tick(ctx: &mut HookContext<Form>, data: Option<&Form>) -> HookResult {
    let Some(Form::Locked {
        username,
        seconds_remaining,
    }) = data
    else {
        return Err("unexpected data in locked state".into());
    };
    let second = Duration::from_secs(1);
    if *seconds_remaining > 1 {
        ctx.schedule_update(
            second,
            Form::Locked {
                username: username.clone(),
                seconds_remaining: seconds_remaining - 1,
            },
        );
    } else {
        ctx.schedule_change(
            second,
            Form::Error {
                username: username.clone(),
                message: "try again".to_string(),
            },
        );
    }
    Ok(())
}

fn graph() -> GraphBuilder<Form> {
    let attempts = Arc::new(AtomicU32::new(0));

    GraphBuilder::new()
        .state(
            Login::AwaitingInput,
            StateEntry::new()
                .enter_from_init()
                .enter_from(Login::Error)
                .leave_to(Login::FrontendValidationCheck),
        )
        .state(
            Login::FrontendValidationCheck,
            StateEntry::new()
                .enter_from(Login::AwaitingInput)
                .leave_to(Login::Error)
                .leave_to(Login::SubmittingCredentials)
                .on_enter(validate),
        )
        .state(
            Login::Error,
            StateEntry::new()
                .enter_from(Login::FrontendValidationCheck)
                .enter_from(Login::SubmittingCredentials)
                .enter_from(Login::Locked)
                .leave_to(Login::AwaitingInput),
        )
        .state(
            Login::SubmittingCredentials,
            StateEntry::new()
                .enter_from(Login::FrontendValidationCheck)
                .leave_to(Login::Error)
                .leave_to(Login::Locked)
                .leave_to(Login::CredentialsAccepted)
                .read_only()
                .on_enter(move |ctx, changes: &EnterChanges<Form>| {
                    let Some(Form::SubmittingCredentials { username, password }) =
                        changes.entering.data()
                    else {
                        return Err("unexpected data in submission".into());
                    };
                    let username = username.clone();
                    if password == PASSWORD {
                        ctx.change_state(Form::CredentialsAccepted { username });
                    } else if attempts.fetch_add(1, Ordering::SeqCst) + 1 >= 3 {
                        attempts.store(0, Ordering::SeqCst);
                        ctx.change_state(Form::Locked {
                            username,
                            seconds_remaining: 3,
                        });
                    } else {
                        ctx.change_state(Form::Error {
                            username,
                            message: "username or password not recognized".to_string(),
                        });
                    }
                    Ok(())
                }),
        )
        .state(
            Login::Locked,
            StateEntry::new()
                .enter_from(Login::SubmittingCredentials)
                .leave_to(Login::Error)
                .on_enter(|ctx, changes: &EnterChanges<Form>| tick(ctx, changes.entering.data()))
                .on_update(|ctx, changes: &UpdateChanges<Form>| tick(ctx, changes.current.data())),
        )
        .state(
            Login::CredentialsAccepted,
            StateEntry::new()
                .enter_from(Login::SubmittingCredentials)
                .leave_to_terminate()
                .on_enter(|ctx, _| {
                    ctx.terminate();
                    Ok(())
                }),
        )
}

async fn try_login(handle: &fsm_rx::FsmHandle<Form>, password: &str) {
    let _ = handle
        .change_state(Form::AwaitingInput {
            username: "ada".to_string(),
            password: String::new(),
        })
        .await;
    let _ = handle
        .change_state(Form::FrontendValidationCheck {
            username: "ada".to_string(),
            password: password.to_string(),
        })
        .await;
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== User Login State Machine ===\n");

    let engine = Engine::builder()
        .graph(graph())
        .config(FsmConfig {
            debug_log_buffer_count: 50,
            ..FsmConfig::default()
        })
        .build()
        .unwrap();
    println!("{}\n", engine.state_diagram());

    let handle = FsmService::spawn(engine);
    let mut form = handle.state_data();
    let watcher = tokio::spawn(async move {
        while let Some(data) = form.recv().await {
            match data {
                Some(data) => println!("  {data:?}"),
                None => println!("  (no data)"),
            }
        }
    });

    println!("Three wrong passwords:");
    for _ in 0..3 {
        try_login(&handle, "password1").await;
    }

    while handle.current_state().node() != Node::State(Login::Error) {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    println!("\nCorrect password after the lockout:");
    try_login(&handle, PASSWORD).await;

    let log = handle.debug_log().await.unwrap();
    println!("\n{}", DebugLogView::new(log.entries()).keys(["username"]).to_text());

    handle.shutdown().await;
    let _ = watcher.await;
}
