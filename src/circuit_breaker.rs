use failsafe::{backoff, failure_policy, Config, StateMachine};
use std::time::Duration;

/// Circuit breaker type guarding the vision upstream. Cloning shares the
/// underlying state, so one instance lives in `AppState`.
pub type VisionBreaker =
    StateMachine<failure_policy::ConsecutiveFailures<backoff::Exponential>, ()>;

/// Creates the circuit breaker for vision-service calls.
///
/// The vision upstream is the slowest dependency we have; when it is down,
/// failing fast keeps analysis requests on the heuristic fallback path
/// instead of stacking up 90-second timeouts.
///
/// - **Failure threshold**: 3 consecutive failures trigger the OPEN state.
/// - **Backoff**: exponential from 15s to 120s before probing recovery.
pub fn create_vision_circuit_breaker() -> VisionBreaker {
    let backoff_strategy = backoff::exponential(
        Duration::from_secs(15),  // Initial delay
        Duration::from_secs(120), // Maximum delay
    );

    let failure_policy = failure_policy::consecutive_failures(3, backoff_strategy);

    Config::new().failure_policy(failure_policy).build()
}
