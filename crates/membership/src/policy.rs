//! How each mutation treats the HTTP status the collections API answers with.

use std::fmt;

use http::StatusCode;

use crate::MutationOutcome;

/// Mutating collections API actions.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Mutation {
    /// `action=CREATE`
    CreateCollection,

    /// `action=DELETE`
    DeleteCollection,

    /// `action=ADDREPLICA`
    AddReplica,

    /// `action=DELETEREPLICA`
    DeleteReplica,
}

impl Mutation {
    /// Value of the `action` query parameter.
    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::CreateCollection => "CREATE",
            Self::DeleteCollection => "DELETE",
            Self::AddReplica => "ADDREPLICA",
            Self::DeleteReplica => "DELETEREPLICA",
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CreateCollection => "creating collection",
            Self::DeleteCollection => "deleting collection",
            Self::AddReplica => "adding replica",
            Self::DeleteReplica => "deleting replica",
        })
    }
}

/// What to do with a response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Stop and report the outcome.
    Done(MutationOutcome),

    /// Wait and send the request again.
    Retry,

    /// Stop and report the status as an error.
    Fail,
}

/// Classifies the status of a mutation response.
///
/// | status | create collection | add replica | delete collection | delete replica |
/// |--------|-------------------|-------------|-------------------|----------------|
/// | 200    | applied           | applied     | applied           | applied        |
/// | 504    | assumed applied   | assumed     | assumed applied   | assumed        |
/// | 500    | retry             | retry       | fail              | ignored        |
/// | 503    | retry             | retry       | fail              | fail           |
/// | 400    | ignored           | retry       | ignored           | fail           |
/// | other  | fail              | fail        | fail              | fail           |
#[must_use]
pub fn disposition(mutation: Mutation, status: StatusCode) -> Disposition {
    match (mutation, status.as_u16()) {
        (_, 200) => Disposition::Done(MutationOutcome::Applied),
        (_, 504) => Disposition::Done(MutationOutcome::AssumedApplied),
        (Mutation::CreateCollection | Mutation::AddReplica, 500 | 503)
        | (Mutation::AddReplica, 400) => Disposition::Retry,
        (Mutation::CreateCollection | Mutation::DeleteCollection, 400)
        | (Mutation::DeleteReplica, 500) => Disposition::Done(MutationOutcome::Ignored),
        _ => Disposition::Fail,
    }
}
