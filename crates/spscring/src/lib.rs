//! Bounded lock-free SPSC ring buffer.
//!
//! A single-producer single-consumer queue split into a [`Producer`] /
//! [`Consumer`] handle pair. Exactly one thread owns each handle; neither
//! handle is cloneable, so the single-writer invariants that make the ring
//! lock-free are enforced by the type system rather than by convention.
//!
//! # Key Features
//!
//! - Cache-line-padded indices (no false sharing between the two sides)
//! - Cached views of the opposite index to minimize cross-core traffic
//! - Batch drain API (single head update for N items)
//! - `push` never blocks: a full ring hands the item straight back
//!
//! # Example
//!
//! ```
//! use spscring::ring;
//!
//! let (producer, consumer) = ring::<u64>(8);
//!
//! producer.push(1).unwrap();
//! producer.push(2).unwrap();
//!
//! let mut received = Vec::new();
//! let drained = consumer.drain(16, |item| received.push(item));
//!
//! assert_eq!(drained, 2);
//! assert_eq!(received, vec![1, 2]);
//! ```

mod invariants;
mod ring;

pub use ring::{ring, Consumer, Full, Producer};
