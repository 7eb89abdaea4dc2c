//! Shared fixtures for the scenario tests: a timed traffic light with an
//! optional pedestrian crossing.

#![allow(dead_code)]

use fsm_rx::core::{Node, Snapshot, StateData};
use fsm_rx::engine::{
    EnterChanges, ErrorHandler, HookContext, HookFault, HookResult, LeaveChanges, Rejection,
    Verdict,
};
use fsm_rx::graph::{GraphBuilder, StateEntry};
use fsm_rx::observe::Subscription;
use fsm_rx::state_enum;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

state_enum! {
    pub enum TrafficLight {
        Go = "go",
        PrepareToStop = "prepareToStop",
        Stop = "stop",
        StopStartWalking = "stop_startWalking",
        StopFinishWalking = "stop_finishWalking",
    }
}

/// Time spent in each state, in milliseconds.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub go: u64,
    pub prepare_to_stop: u64,
    pub stop: u64,
    pub start_walking: u64,
    pub finish_walking: u64,
}

impl Timings {
    pub fn delay(&self, state: TrafficLight) -> Duration {
        let millis = match state {
            TrafficLight::Go => self.go,
            TrafficLight::PrepareToStop => self.prepare_to_stop,
            TrafficLight::Stop => self.stop,
            TrafficLight::StopStartWalking => self.start_walking,
            TrafficLight::StopFinishWalking => self.finish_walking,
        };
        Duration::from_millis(millis)
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            go: 7000,
            prepare_to_stop: 3000,
            stop: 10000,
            start_walking: 3000,
            finish_walking: 2100,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficLightData {
    pub state: TrafficLight,
    pub pedestrian_crossing_requested: bool,
    pub timings: Timings,
}

impl StateData for TrafficLightData {
    type State = TrafficLight;

    fn state(&self) -> TrafficLight {
        self.state
    }
}

pub fn light(state: TrafficLight) -> TrafficLightData {
    TrafficLightData {
        state,
        pedestrian_crossing_requested: false,
        timings: Timings::default(),
    }
}

/// Move to the first successor once the entered state's time is up.
pub fn schedule_next(
    ctx: &mut HookContext<TrafficLightData>,
    changes: &EnterChanges<TrafficLightData>,
) -> HookResult {
    let entering = &changes.entering;
    let data = entering.data().ok_or("entered a state without data")?;
    let next = entering.next_state().ok_or("state has no successor")?;

    ctx.schedule_change(
        data.timings.delay(data.state),
        TrafficLightData {
            state: next,
            pedestrian_crossing_requested: data.pedestrian_crossing_requested
                && data.state != TrafficLight::StopStartWalking,
            ..data.clone()
        },
    );
    Ok(())
}

pub fn traffic_light_entries() -> Vec<(TrafficLight, StateEntry<TrafficLightData>)> {
    vec![
        (
            TrafficLight::Go,
            StateEntry::new()
                .enter_from_init()
                .enter_from(TrafficLight::Stop)
                .leave_to(TrafficLight::PrepareToStop)
                .on_enter(schedule_next),
        ),
        (
            TrafficLight::PrepareToStop,
            StateEntry::new()
                .enter_from(TrafficLight::Go)
                .leave_to(TrafficLight::Stop)
                .on_enter(schedule_next),
        ),
        (
            TrafficLight::Stop,
            StateEntry::new()
                .enter_from(TrafficLight::PrepareToStop)
                .leave_to(TrafficLight::Go)
                .on_enter(schedule_next),
        ),
    ]
}

pub fn traffic_light_graph() -> GraphBuilder<TrafficLightData> {
    traffic_light_entries()
        .into_iter()
        .fold(GraphBuilder::new(), |graph, (state, entry)| {
            graph.state(state, entry)
        })
}

/// Redirect to the walking phase instead of stopping when a crossing was
/// requested.
fn hold_for_crossing(
    ctx: &mut HookContext<TrafficLightData>,
    changes: &LeaveChanges<TrafficLightData>,
) -> Result<Verdict, fsm_rx::engine::HookError> {
    let leaving = changes.leaving.data().ok_or("left a state without data")?;
    let stopping = changes.entering.state() == Some(TrafficLight::Stop);

    if stopping && leaving.pedestrian_crossing_requested {
        ctx.change_state(TrafficLightData {
            state: TrafficLight::StopStartWalking,
            ..leaving.clone()
        });
        return Ok(Verdict::Veto);
    }
    Ok(Verdict::Allow)
}

fn enter_stop(
    ctx: &mut HookContext<TrafficLightData>,
    changes: &EnterChanges<TrafficLightData>,
) -> HookResult {
    let data = changes.entering.data().ok_or("entered a state without data")?;
    let timings = data.timings;
    let millis = if changes.leaving.state() == Some(TrafficLight::StopFinishWalking) {
        timings.stop - (timings.start_walking + timings.finish_walking)
    } else {
        timings.stop
    };

    ctx.schedule_change(
        Duration::from_millis(millis),
        TrafficLightData {
            state: TrafficLight::Go,
            ..data.clone()
        },
    );
    Ok(())
}

pub fn crossing_graph() -> GraphBuilder<TrafficLightData> {
    GraphBuilder::new()
        .state(
            TrafficLight::Go,
            StateEntry::new()
                .enter_from_init()
                .enter_from(TrafficLight::Stop)
                .leave_to(TrafficLight::PrepareToStop)
                .on_enter(schedule_next),
        )
        .state(
            TrafficLight::PrepareToStop,
            StateEntry::new()
                .enter_from(TrafficLight::Go)
                .leave_to(TrafficLight::Stop)
                .leave_to(TrafficLight::StopStartWalking)
                .on_enter(schedule_next)
                .on_leave(hold_for_crossing),
        )
        .state(
            TrafficLight::StopStartWalking,
            StateEntry::new()
                .enter_from(TrafficLight::PrepareToStop)
                .leave_to(TrafficLight::StopFinishWalking)
                .on_enter(schedule_next),
        )
        .state(
            TrafficLight::StopFinishWalking,
            StateEntry::new()
                .enter_from(TrafficLight::StopStartWalking)
                .leave_to(TrafficLight::Stop)
                .on_enter(schedule_next),
        )
        .state(
            TrafficLight::Stop,
            StateEntry::new()
                .enter_from(TrafficLight::PrepareToStop)
                .enter_from(TrafficLight::StopFinishWalking)
                .leave_to(TrafficLight::Go)
                .on_enter(enter_stop),
        )
}

/// Error handler that keeps everything it is told about.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    pub rejections: Arc<Mutex<Vec<Rejection>>>,
    pub faults: Arc<Mutex<Vec<HookFault>>>,
}

impl<D: StateData> ErrorHandler<D> for RecordingHandler {
    fn on_transition_rejected(&self, rejection: &Rejection, _: &Snapshot<D>) {
        self.rejections.lock().unwrap().push(rejection.clone());
    }

    fn on_unknown_error(&self, fault: &HookFault, _: &Snapshot<D>) {
        self.faults.lock().unwrap().push(fault.clone());
    }
}

/// Receive snapshots until `count` distinct consecutive nodes were seen,
/// stamping each with the milliseconds elapsed since `start`.
pub async fn record_nodes<D: StateData>(
    subscription: &mut Subscription<D>,
    start: Instant,
    count: usize,
) -> Vec<(u64, Node<D::State>)> {
    let mut seen: Vec<(u64, Node<D::State>)> = Vec::new();
    while seen.len() < count {
        let snapshot = subscription.recv().await.expect("service stopped early");
        if seen.last().map(|(_, node)| *node) == Some(snapshot.node()) {
            continue;
        }
        seen.push((start.elapsed().as_millis() as u64, snapshot.node()));
    }
    seen
}
