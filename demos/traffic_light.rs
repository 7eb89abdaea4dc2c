//! Traffic Light State Machine
//!
//! A timed light that cycles go -> prepareToStop -> stop, with a pedestrian
//! crossing that can be requested while the light is running.
//!
//! Key concepts:
//! - Hooks scheduling delayed follow-up changes
//! - `on_leave` vetoing a change and redirecting elsewhere
//! - Subscribing to snapshots from a running service
//! - Rendering the graph as a Mermaid state diagram
//!
//! Run with: cargo run --example traffic_light
//! Set RUST_LOG=fsm_rx=debug to see every transition.

use fsm_rx::core::StateData;
use fsm_rx::engine::{EnterChanges, HookContext, HookResult, LeaveChanges, Verdict};
use fsm_rx::graph::{GraphBuilder, StateEntry};
use fsm_rx::{state_enum, Engine, FsmService};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

state_enum! {
    enum Light {
        Go = "go",
        PrepareToStop = "prepareToStop",
        Stop = "stop",
        StartWalking = "stop_startWalking",
        FinishWalking = "stop_finishWalking",
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LightData {
    state: Light,
    crossing_requested: bool,
}

impl StateData for LightData {
    type State = Light;

    fn state(&self) -> Light {
        self.state
    }
}

// Demo timings, a tenth of a real light's.
fn phase(state: Light) -> Duration {
    let millis = match state {
        Light::Go => 700,
        Light::PrepareToStop => 300,
        Light::Stop => 1000,
        Light::StartWalking => 300,
        Light::FinishWalking => 210,
    };
    Duration::from_millis(millis)
}

fn advance(ctx: &mut HookContext<LightData>, changes: &EnterChanges<LightData>) -> HookResult {
    let data = changes.entering.data().ok_or("entered without data")?;
    let next = changes.entering.next_state().ok_or("no successor")?;
    ctx.schedule_change(
        phase(data.state),
        LightData {
            state: next,
            crossing_requested: data.crossing_requested && data.state != Light::StartWalking,
        },
    );
    Ok(())
}

fn hold_for_crossing(
    ctx: &mut HookContext<LightData>,
    changes: &LeaveChanges<LightData>,
) -> Result<Verdict, fsm_rx::engine::HookError> {
    let leaving = changes.leaving.data().ok_or("left without data")?;
    if changes.entering.state() == Some(Light::Stop) && leaving.crossing_requested {
        ctx.change_state(LightData {
            state: Light::StartWalking,
            ..leaving.clone()
        });
        return Ok(Verdict::Veto);
    }
    Ok(Verdict::Allow)
}

fn graph() -> GraphBuilder<LightData> {
    GraphBuilder::new()
        .state(
            Light::Go,
            StateEntry::new()
                .enter_from_init()
                .enter_from(Light::Stop)
                .leave_to(Light::PrepareToStop)
                .on_enter(advance),
        )
        .state(
            Light::PrepareToStop,
            StateEntry::new()
                .enter_from(Light::Go)
                .leave_to(Light::Stop)
                .leave_to(Light::StartWalking)
                .on_enter(advance)
                .on_leave(hold_for_crossing),
        )
        .state(
            Light::StartWalking,
            StateEntry::new()
                .enter_from(Light::PrepareToStop)
                .leave_to(Light::FinishWalking)
                .on_enter(advance),
        )
        .state(
            Light::FinishWalking,
            StateEntry::new()
                .enter_from(Light::StartWalking)
                .leave_to(Light::Stop)
                .on_enter(advance),
        )
        .state(
            Light::Stop,
            StateEntry::new()
                .enter_from(Light::PrepareToStop)
                .enter_from(Light::FinishWalking)
                .leave_to(Light::Go)
                .on_enter(advance),
        )
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Traffic Light State Machine ===\n");

    let engine = Engine::builder().graph(graph()).build().unwrap();
    println!("{}\n", engine.state_diagram());

    let handle = FsmService::spawn(engine);
    let mut states = handle.subscribe();
    let watcher = tokio::spawn(async move {
        while let Some(snapshot) = states.recv().await {
            println!("  -> {}", snapshot.node());
        }
    });

    handle
        .change_state(LightData {
            state: Light::Go,
            crossing_requested: false,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(800)).await;
    println!("\nPedestrian presses the button");
    let current = handle.current_state();
    if let Some(data) = current.data() {
        let _ = handle
            .update_state(LightData {
                crossing_requested: true,
                ..data.clone()
            })
            .await;
    }

    tokio::time::sleep(Duration::from_millis(3000)).await;

    let log = handle.debug_log().await.unwrap();
    println!("\nVisited: {:?}", log.get_path());

    handle.shutdown().await;
    let _ = watcher.await;
}
