// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! `MmrLeaf`: the trait expressing what the reference implementation does
//! with inheritance-flavoured templating on the MMR leaf type.

/// Why a leaf's contribution is being added to the running `Sum`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdditionReason {
    /// The leaf was appended.
    Appended,
    /// The leaf was restored from the prune list during a rewind.
    Restored,
}

/// Why a leaf's contribution is being subtracted from the running `Sum`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubtractionReason {
    /// The leaf was pruned.
    Pruned,
    /// The leaf disappeared because the MMR was rewound past it.
    Rewinded,
    /// A prune-history entry was discarded because its leaf index now lies
    /// beyond the rewound leaf count.
    Discarded,
}

/// A value storable as an MMR leaf. `Sum` must be a commutative,
/// associative aggregate (a monoid under `add_to_sum`/`subtract_from_sum`);
/// `LookupKey` is the value callers look leaves up by.
pub trait MmrLeaf: Clone + Sized {
    /// The monoid-like aggregate tracked over all live leaves.
    type Sum: Clone;
    /// The value callers look this leaf type up by (e.g. a commitment).
    type LookupKey: Ord + Clone;

    /// Whether more than one live leaf may share the same `LookupKey`.
    const ALLOW_DUPLICATE_LOOKUP_VALUES: bool;
    /// Upper bound on `serialize()`'s output length, for framing caps.
    const MAXIMUM_SERIALIZED_LENGTH: usize;

    /// Identity element of `Sum`.
    fn zero_sum() -> Self::Sum;

    /// Serialize this leaf to its canonical wire form.
    fn serialize(&self, protocol_version: u32) -> Vec<u8>;

    /// Parse one leaf starting at the front of `bytes`, returning the leaf
    /// and the number of bytes consumed. `is_first` marks the
    /// first-in-protocol leaf (some leaf types encode a variant byte only
    /// conditionally on protocol version / position).
    fn unserialize(bytes: &[u8], protocol_version: u32, is_first: bool) -> Option<(Self, usize)>;

    /// The key other leaves can look this one up by, if this leaf type
    /// supports lookup.
    fn lookup_key(&self) -> Option<Self::LookupKey>;

    /// Fold this leaf's contribution into `sum` for the given reason.
    fn add_to_sum(&self, sum: &Self::Sum, reason: AdditionReason) -> Self::Sum;

    /// Remove this leaf's contribution from `sum` for the given reason.
    fn subtract_from_sum(&self, sum: &Self::Sum, reason: SubtractionReason) -> Self::Sum;
}
