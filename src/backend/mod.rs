//! Model providers that implement [`ScoringFunction`](crate::screening::scoring::ScoringFunction).

#[cfg(feature = "rten")]
pub mod rten;
