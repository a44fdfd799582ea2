//! Mounting-profile matching.
//!
//! A profile is a named compatibility tag (`size2`, `size2-slim`, ...). A
//! model presents a profile list at each end and accepts a list from whatever
//! mates to that end.

/// Whether every profile in `profiles` is accepted by `compatible`.
///
/// An empty `profiles` list never matches: a model end that presents no
/// profile cannot mate with anything.
pub fn is_subset(profiles: &[String], compatible: &[String]) -> bool {
    !profiles.is_empty() && profiles.iter().all(|p| compatible.iter().any(|c| c == p))
}
