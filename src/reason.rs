//-
// Copyright 2017, 2018 The proptest developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// The reason for why something, such as a generated value, was rejected.
///
/// Currently this is merely a wrapper around a message, but more properties
/// may be added in the future.
///
/// This is constructed via `.into()` on a `String`, `&'static str`, or
/// `Box<str>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reason(Cow<'static, str>);

impl Reason {
    /// Return the message for this `Reason`.
    ///
    /// The message is intended for human consumption, and is not guaranteed
    /// to have any format in particular.
    pub fn message(&self) -> &str {
        &*self.0
    }
}

impl From<&'static str> for Reason {
    fn from(s: &'static str) -> Self {
        Reason(s.into())
    }
}

impl From<String> for Reason {
    fn from(s: String) -> Self {
        Reason(s.into())
    }
}

impl From<Box<str>> for Reason {
    fn from(s: Box<str>) -> Self {
        Reason(String::from(s).into())
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self.message(), f)
    }
}

/// An opaque key distinguishing one bug from another.
///
/// Two `INTERESTING` examples with the same origin are considered the same
/// failure for the purposes of `Engine::interesting_examples` and the
/// shrinker's per-origin minimization; two with different origins are shrunk
/// independently. The engine never interprets the contents of an origin, it
/// only compares them for equality and hashes them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterestingOrigin(Arc<str>);

impl InterestingOrigin {
    /// Build an origin from the `Reason` a test case failed with.
    ///
    /// Using the failure message as the origin is the simplest policy that
    /// satisfies the contract ("distinguish one bug from another"): test
    /// functions that want finer- or coarser-grained de-duplication than
    /// "same failure message" can construct an `InterestingOrigin` directly
    /// via `InterestingOrigin::new` instead.
    pub fn from_reason(reason: &Reason) -> Self {
        InterestingOrigin(Arc::from(reason.message()))
    }

    /// Build an origin from an arbitrary opaque tag.
    pub fn new(tag: impl Into<Arc<str>>) -> Self {
        InterestingOrigin(tag.into())
    }
}

impl fmt::Display for InterestingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_message_roundtrips() {
        let r: Reason = "oops".into();
        assert_eq!("oops", r.message());
    }

    #[test]
    fn same_message_same_origin() {
        let a = InterestingOrigin::from_reason(&Reason::from("boom"));
        let b = InterestingOrigin::from_reason(&Reason::from("boom".to_string()));
        assert_eq!(a, b);
    }

    #[test]
    fn different_message_different_origin() {
        let a = InterestingOrigin::from_reason(&Reason::from("boom"));
        let b = InterestingOrigin::from_reason(&Reason::from("bang"));
        assert_ne!(a, b);
    }
}
