//! Polynomial secret sharing over the two supported curves.
//!
//! Both modules expose the same surface: polynomial sampling and
//! evaluation, Feldman commitments with share verification, Lagrange
//! interpolation at an arbitrary point, and the curve's signing
//! primitive. They stay concrete rather than generic; the group APIs
//! differ enough that a shared trait would obscure more than it saves.

pub mod ed25519;
pub mod secp256k1;
