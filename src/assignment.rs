//! Permission set assignment reconciliation
//!
//! A single declared assignment ("this permission set for this principal on
//! these accounts") is stored by the backend as one row per account, and the
//! create call only echoes the first row. The rows are recovered by listing
//! after the create, and the logical resource is identified by the
//! comma-joined row ids ([`CompositeId`]).
//!
//! Deleting an AWS account or a permission set must first remove the rows that
//! reference it; [`purge_assignments`] does that and waits for the backend to
//! settle.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use thiserror::Error;

use crate::client::PrismApi;
use crate::error::{PrismError, is_not_found};
use crate::models::{PermissionSetAssignment, PrincipalType};
use crate::wait::{Interrupt, OpContext, PollPolicy, WaitError, wait_for_dependency_with};

/// Comma-joined backend row ids of one logical assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeId(Vec<String>);

impl CompositeId {
    pub fn new(ids: Vec<String>) -> Result<Self, PrismError> {
        let ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return Err(PrismError::validation(
                "id",
                "composite assignment id contains no assignment ids",
            ));
        }
        Ok(Self(ids))
    }

    pub fn ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl FromStr for CompositeId {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CompositeId::new(s.split(',').map(str::to_string).collect())
    }
}

/// A non-fatal problem worth surfacing to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub summary: &'static str,
    pub detail: String,
}

impl Warning {
    fn new(summary: &'static str, detail: impl Into<String>) -> Self {
        Self {
            summary,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{what} dependency not satisfied: {source}")]
    Dependency {
        what: &'static str,
        #[source]
        source: WaitError,
    },

    #[error("unable to create permission set assignment, got error: {0}")]
    Create(#[source] PrismError),

    #[error("unable to list permission set assignments after create, got error: {0}")]
    List(#[source] PrismError),

    #[error(
        "failed to locate any of the created assignments; they may have been created but are not yet visible in the API"
    )]
    NoneRecovered,

    #[error("unable to read any of the assignments: {}", .failures.join("; "))]
    Unreadable { failures: Vec<String> },

    #[error("failed to delete some permission set assignments: {}", .failures.join("; "))]
    Delete { failures: Vec<String> },
}

impl ReconcileError {
    /// Short headline for diagnostics
    pub fn summary(&self) -> &'static str {
        match self {
            ReconcileError::Dependency { .. } => "Dependency Error",
            ReconcileError::NoneRecovered => "No Assignments Found",
            ReconcileError::Create(_)
            | ReconcileError::List(_)
            | ReconcileError::Unreadable { .. }
            | ReconcileError::Delete { .. } => "Client Error",
        }
    }
}

/// What the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentTarget {
    pub permission_set_id: String,
    pub principal_type: PrincipalType,
    pub principal: String,
    pub account_ids: Vec<String>,
}

impl AssignmentTarget {
    /// Account ids are deduplicated, keeping first-seen order
    pub fn new(
        permission_set_id: impl Into<String>,
        principal_type: PrincipalType,
        principal: impl Into<String>,
        account_ids: impl IntoIterator<Item = String>,
    ) -> Result<Self, PrismError> {
        let mut seen = HashSet::new();
        let account_ids: Vec<String> = account_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        if account_ids.is_empty() {
            return Err(PrismError::validation(
                "account_ids",
                "at least one account id is required",
            ));
        }

        Ok(Self {
            permission_set_id: permission_set_id.into(),
            principal_type,
            principal: principal.into(),
            account_ids,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CreatedAssignment {
    pub id: CompositeId,
    pub warnings: Vec<Warning>,
}

/// Wait for every referenced object to be visible.
pub fn wait_for_references(
    api: &dyn PrismApi,
    ctx: &OpContext,
    policy: PollPolicy,
    target: &AssignmentTarget,
) -> Result<(), ReconcileError> {
    let ps_id = target.permission_set_id.as_str();
    wait_for_dependency_with(ctx, policy, "permission_set", ps_id, || {
        api.get_permission_set(ps_id).map(|_| ())
    })
    .map_err(|source| ReconcileError::Dependency {
        what: "Permission set",
        source,
    })?;

    for account_id in &target.account_ids {
        wait_for_dependency_with(ctx, policy, "aws_account", account_id, || {
            api.get_aws_account(account_id).map(|_| ())
        })
        .map_err(|source| ReconcileError::Dependency {
            what: "AWS account",
            source,
        })?;
    }

    let principal = target.principal.as_str();
    match target.principal_type {
        PrincipalType::User => wait_for_dependency_with(ctx, policy, "user", principal, || {
            api.get_user(principal).map(|_| ())
        })
        .map_err(|source| ReconcileError::Dependency {
            what: "User",
            source,
        }),
        PrincipalType::Group => wait_for_dependency_with(ctx, policy, "group", principal, || {
            api.get_group(principal).map(|_| ())
        })
        .map_err(|source| ReconcileError::Dependency {
            what: "Group",
            source,
        }),
    }
}

/// Create the assignment rows and recover their ids.
///
/// For each requested account the first matching row that has not been
/// claimed by an earlier account is taken. Accounts with no visible row yield
/// a warning; if no row at all is found the create fails.
pub fn create_assignment(
    api: &dyn PrismApi,
    ctx: &OpContext,
    policy: PollPolicy,
    target: &AssignmentTarget,
) -> Result<CreatedAssignment, ReconcileError> {
    wait_for_references(api, ctx, policy, target)?;

    let request = PermissionSetAssignment::request(
        &target.permission_set_id,
        target.principal_type,
        &target.principal,
        &target.account_ids,
    );
    api.create_assignment(&request)
        .map_err(ReconcileError::Create)?;

    let rows = api.list_assignments().map_err(ReconcileError::List)?;

    let mut claimed: HashSet<&str> = HashSet::new();
    let mut ids = Vec::new();
    let mut warnings = Vec::new();

    for account_id in &target.account_ids {
        let found = rows.iter().find(|row| {
            !claimed.contains(row.id.as_str())
                && row.matches(
                    &target.permission_set_id,
                    target.principal_type,
                    &target.principal,
                    account_id,
                )
        });

        match found {
            Some(row) => {
                claimed.insert(row.id.as_str());
                ids.push(row.id.clone());
            }
            None => {
                tracing::warn!(account_id = %account_id, "created assignment row not visible");
                warnings.push(Warning::new(
                    "Assignment Not Found",
                    format!(
                        "Could not find assignment for account {} after creation. It may have been created but not immediately visible.",
                        account_id
                    ),
                ));
            }
        }
    }

    let id = CompositeId::new(ids).map_err(|_| ReconcileError::NoneRecovered)?;
    tracing::debug!(id = %id, recovered = id.len(), requested = target.account_ids.len(), "assignment created");

    Ok(CreatedAssignment { id, warnings })
}

/// Remote view of a logical assignment
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentSnapshot {
    pub permission_set_id: String,
    pub principal_type: PrincipalType,
    pub principal: String,
    pub account_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// Every row is gone
    Gone,
    Present {
        snapshot: AssignmentSnapshot,
        warnings: Vec<Warning>,
    },
}

/// Fetch each row of a composite id.
///
/// Missing rows are dropped. If every row is missing the assignment is gone,
/// unless some rows failed for another reason, in which case nothing is
/// known and the read fails.
pub fn read_assignment(api: &dyn PrismApi, id: &CompositeId) -> Result<ReadOutcome, ReconcileError> {
    let mut rows = Vec::new();
    let mut failures = Vec::new();
    let mut warnings = Vec::new();

    for row_id in id.ids() {
        match api.get_assignment(row_id) {
            Ok(row) => rows.push(row),
            Err(err) if err.is_not_found() => {
                tracing::debug!(row_id = %row_id, "assignment row no longer exists");
            }
            Err(err) => {
                warnings.push(Warning::new(
                    "API Error",
                    format!("Unable to read assignment {}: {}", row_id, err),
                ));
                failures.push(format!("assignment {}: {}", row_id, err));
            }
        }
    }

    let Some(first) = rows.first() else {
        if failures.is_empty() {
            return Ok(ReadOutcome::Gone);
        }
        return Err(ReconcileError::Unreadable { failures });
    };

    if rows.len() < id.len() {
        warnings.push(Warning::new(
            "Partial Assignment Drift",
            format!(
                "Only {} of {} assignments still exist. Some may have been deleted outside Terraform.",
                rows.len(),
                id.len()
            ),
        ));
    }

    let snapshot = AssignmentSnapshot {
        permission_set_id: first.permission_set_id.clone(),
        principal_type: first.principal_type,
        principal: first.principal().to_string(),
        account_ids: rows.iter().map(|row| row.account_id.clone()).collect(),
    };

    Ok(ReadOutcome::Present { snapshot, warnings })
}

/// Delete every row of a composite id; rows already gone count as deleted.
pub fn delete_assignment(api: &dyn PrismApi, id: &CompositeId) -> Result<(), ReconcileError> {
    let failures: Vec<String> = id
        .ids()
        .iter()
        .filter_map(|row_id| match api.delete_assignment(row_id) {
            Ok(()) => None,
            Err(err) if err.is_not_found() => None,
            Err(err) => Some(format!("assignment {}: {}", row_id, err)),
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(ReconcileError::Delete { failures })
    }
}

/// Object whose assignments must be removed before it can be deleted
#[derive(Debug, Clone, Copy)]
pub enum CascadeParent<'a> {
    Account(&'a str),
    PermissionSet(&'a str),
}

impl CascadeParent<'_> {
    fn references(&self, row: &PermissionSetAssignment) -> bool {
        match self {
            CascadeParent::Account(account_id) => row.account_id == *account_id,
            CascadeParent::PermissionSet(id) => row.permission_set_id == *id,
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            CascadeParent::Account(_) => "account",
            CascadeParent::PermissionSet(_) => "permission set",
        }
    }
}

impl fmt::Display for CascadeParent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CascadeParent::Account(id) | CascadeParent::PermissionSet(id) => {
                write!(f, "{} {}", self.noun(), id)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CascadeReport {
    pub deleted: Vec<String>,
    pub warnings: Vec<Warning>,
    /// Set when the settle wait was cut short by the caller
    pub interrupted: Option<Interrupt>,
}

/// Delete every assignment referencing `parent`, then wait until the deleted
/// rows are no longer fetchable. Nothing here is fatal: failures become
/// warnings and the caller goes on to delete the parent.
pub fn purge_assignments(
    api: &dyn PrismApi,
    ctx: &OpContext,
    policy: PollPolicy,
    parent: CascadeParent<'_>,
) -> CascadeReport {
    let mut report = CascadeReport::default();
    let noun = parent.noun();

    let rows = match api.list_assignments() {
        Ok(rows) => rows,
        Err(err) => {
            report.warnings.push(Warning::new(
                "Unable to List Assignments",
                format!(
                    "Could not list permission set assignments before deleting {}. If assignments exist, {} deletion may fail: {}",
                    parent, noun, err
                ),
            ));
            return report;
        }
    };

    let mut failures = Vec::new();
    for row in rows.iter().filter(|row| parent.references(row)) {
        match api.delete_assignment(&row.id) {
            Ok(()) => report.deleted.push(row.id.clone()),
            Err(err) => failures.push(format!("assignment {}: {}", row.id, err)),
        }
    }

    if !failures.is_empty() {
        report.warnings.push(Warning::new(
            "Failed to Delete Some Assignments",
            format!(
                "Could not delete all permission set assignments for {}. {} deletion may fail. Errors: {}",
                parent,
                capitalize(noun),
                failures.join("; ")
            ),
        ));
    }

    if report.deleted.is_empty() {
        return report;
    }

    tracing::info!(parent = %parent, count = report.deleted.len(), "deleted referencing assignments");
    report.warnings.push(Warning::new(
        "Automatic Assignment Cleanup",
        format!(
            "Automatically deleted {} permission set assignment(s) for {} before deleting the {}. This may affect other Terraform resources if they manage these assignments.",
            report.deleted.len(),
            parent,
            noun
        ),
    ));

    wait_until_deleted(api, ctx, policy, noun, &mut report);
    report
}

fn wait_until_deleted(
    api: &dyn PrismApi,
    ctx: &OpContext,
    policy: PollPolicy,
    noun: &str,
    report: &mut CascadeReport,
) {
    let started = Instant::now();
    let mut pending = report.deleted.clone();
    let mut unverifiable: HashSet<String> = HashSet::new();

    loop {
        pending.retain(|row_id| match api.get_assignment(row_id) {
            Ok(_) => true,
            Err(err) if is_not_found(Some(&err)) => false,
            Err(err) => {
                if unverifiable.insert(row_id.clone()) {
                    report.warnings.push(Warning::new(
                        "Error Checking Assignment Status",
                        format!("Could not verify assignment {} was deleted: {}", row_id, err),
                    ));
                }
                false
            }
        });

        if pending.is_empty() {
            return;
        }

        let elapsed = started.elapsed();
        if elapsed >= policy.timeout {
            report.warnings.push(Warning::new(
                "Assignment Deletion Timeout",
                format!(
                    "Waited {}s for assignments to be deleted but they may still be processing. {} deletion may fail.",
                    policy.timeout.as_secs(),
                    capitalize(noun)
                ),
            ));
            return;
        }

        tracing::debug!(pending = pending.len(), "waiting for assignment deletes to settle");
        if let Err(interrupt) = ctx.sleep(policy.interval.min(policy.timeout - elapsed)) {
            report.interrupted = Some(interrupt);
            return;
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{MockPrismApi, fast_policy};

    const A: &str = "111111111111";
    const B: &str = "222222222222";
    const C: &str = "333333333333";

    fn seeded() -> MockPrismApi {
        MockPrismApi::new()
            .with_permission_set("ps-1", "Admin")
            .with_account(A, "alpha")
            .with_account(B, "beta")
            .with_account(C, "gamma")
            .with_user("alice")
            .with_group("ops")
    }

    fn target(accounts: &[&str]) -> AssignmentTarget {
        AssignmentTarget::new(
            "ps-1",
            PrincipalType::User,
            "alice",
            accounts.iter().map(|a| a.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_composite_id_round_trip() {
        let id: CompositeId = "a1, b2,,c3".parse().unwrap();
        assert_eq!(id.ids(), &["a1", "b2", "c3"]);
        assert_eq!(id.to_string(), "a1,b2,c3");
        assert_eq!(id.to_string().parse::<CompositeId>().unwrap(), id);
    }

    #[test]
    fn test_empty_composite_id_is_rejected() {
        assert!("".parse::<CompositeId>().is_err());
        assert!(" , ,".parse::<CompositeId>().is_err());
    }

    #[test]
    fn test_target_deduplicates_accounts() {
        let target = target(&[B, A, B, C, A]);
        assert_eq!(target.account_ids, vec![B, A, C]);
    }

    #[test]
    fn test_target_requires_accounts() {
        let err = AssignmentTarget::new("ps-1", PrincipalType::User, "alice", Vec::new()).unwrap_err();
        assert!(matches!(err, PrismError::Validation { .. }));
    }

    #[test]
    fn test_create_recovers_all_rows() {
        let api = seeded();
        let created =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A, B, C])).unwrap();

        assert_eq!(created.id.len(), 3);
        assert!(created.warnings.is_empty());
        assert_eq!(api.count_calls("POST /permission-set-assignments"), 1);

        let rows: Vec<_> = created
            .id
            .ids()
            .iter()
            .map(|id| api.assignment(id).unwrap().account_id)
            .collect();
        assert_eq!(rows, vec![A, B, C]);
    }

    #[test]
    fn test_create_ignores_unrelated_rows() {
        let api = seeded().with_assignment("other", "ps-1", PrincipalType::Group, "ops", A);
        let created =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A])).unwrap();

        assert_eq!(created.id.len(), 1);
        assert_ne!(created.id.ids()[0], "other");
    }

    #[test]
    fn test_create_warns_for_invisible_rows() {
        let api = seeded().hide_from_list_for_account(B);
        let created =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A, B])).unwrap();

        assert_eq!(created.id.len(), 1);
        assert_eq!(created.warnings.len(), 1);
        assert_eq!(created.warnings[0].summary, "Assignment Not Found");
        assert!(created.warnings[0].detail.contains(B));
    }

    #[test]
    fn test_create_fails_when_nothing_recovered() {
        let api = seeded().hide_from_list_for_account(A);
        let err =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A])).unwrap_err();

        assert!(matches!(err, ReconcileError::NoneRecovered));
        assert_eq!(err.summary(), "No Assignments Found");
    }

    #[test]
    fn test_create_waits_for_late_dependencies() {
        let api = seeded()
            .not_found_times("GET /users/alice", 2)
            .not_found_times(&format!("GET /aws-accounts/{}", B), 1);
        let created =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A, B])).unwrap();

        assert_eq!(created.id.len(), 2);
        assert_eq!(api.count_calls("GET /users/alice"), 3);
        assert_eq!(api.count_calls(&format!("GET /aws-accounts/{}", B)), 2);
    }

    #[test]
    fn test_create_stops_on_dependency_error() {
        let api = seeded().fail("GET /permission-sets/ps-1", 500, "boom");
        let err =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A])).unwrap_err();

        assert_eq!(err.summary(), "Dependency Error");
        assert!(err.to_string().starts_with("Permission set dependency not satisfied: error checking permission_set \"ps-1\""));
        assert_eq!(api.count_calls("POST /permission-set-assignments"), 0);
    }

    #[test]
    fn test_group_principal_waits_on_group() {
        let api = seeded();
        let target =
            AssignmentTarget::new("ps-1", PrincipalType::Group, "ops", vec![A.to_string()]).unwrap();
        create_assignment(&api, &OpContext::background(), fast_policy(), &target).unwrap();

        assert_eq!(api.count_calls("GET /groups/ops"), 1);
        assert_eq!(api.count_calls("GET /users/ops"), 0);
    }

    #[test]
    fn test_read_tracks_out_of_band_removal() {
        let api = seeded();
        let created =
            create_assignment(&api, &OpContext::background(), fast_policy(), &target(&[A, B, C])).unwrap();

        match read_assignment(&api, &created.id).unwrap() {
            ReadOutcome::Present { snapshot, warnings } => {
                assert_eq!(snapshot.account_ids, vec![A, B, C]);
                assert_eq!(snapshot.principal, "alice");
                assert!(warnings.is_empty());
            }
            ReadOutcome::Gone => panic!("assignment should exist"),
        }

        api.remove_assignment(&created.id.ids()[1]);
        match read_assignment(&api, &created.id).unwrap() {
            ReadOutcome::Present { snapshot, warnings } => {
                assert_eq!(snapshot.account_ids, vec![A, C]);
                assert_eq!(warnings.len(), 1);
                assert_eq!(warnings[0].summary, "Partial Assignment Drift");
                assert!(warnings[0].detail.starts_with("Only 2 of 3 assignments still exist"));
            }
            ReadOutcome::Gone => panic!("assignment should exist"),
        }

        api.remove_assignment(&created.id.ids()[0]);
        api.remove_assignment(&created.id.ids()[2]);
        assert_eq!(read_assignment(&api, &created.id).unwrap(), ReadOutcome::Gone);
    }

    #[test]
    fn test_read_with_only_errors_fails() {
        let api = seeded().fail("GET /permission-set-assignments/x1", 500, "db down");
        let id: CompositeId = "x1".parse().unwrap();

        let err = read_assignment(&api, &id).unwrap_err();
        assert!(matches!(err, ReconcileError::Unreadable { .. }));
        assert!(err.to_string().contains("db down"));
    }

    #[test]
    fn test_read_with_some_errors_warns() {
        let api = seeded().with_assignment("r1", "ps-1", PrincipalType::User, "alice", A);
        let api = api.fail("GET /permission-set-assignments/r2", 500, "db down");
        let id: CompositeId = "r1,r2".parse().unwrap();

        match read_assignment(&api, &id).unwrap() {
            ReadOutcome::Present { snapshot, warnings } => {
                assert_eq!(snapshot.account_ids, vec![A]);
                let summaries: Vec<_> = warnings.iter().map(|w| w.summary).collect();
                assert_eq!(summaries, vec!["API Error", "Partial Assignment Drift"]);
            }
            ReadOutcome::Gone => panic!("assignment should exist"),
        }
    }

    #[test]
    fn test_delete_tolerates_missing_rows() {
        let api = seeded()
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .with_assignment("r3", "ps-1", PrincipalType::User, "alice", C);
        let id: CompositeId = "r1,r2,r3".parse().unwrap();

        delete_assignment(&api, &id).unwrap();
        assert_eq!(api.count_calls_with_prefix("DELETE /permission-set-assignments/"), 3);
        assert!(api.assignment("r1").is_none());
        assert!(api.assignment("r3").is_none());
    }

    #[test]
    fn test_delete_aggregates_failures_and_continues() {
        let api = seeded()
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .with_assignment("r2", "ps-1", PrincipalType::User, "alice", B)
            .with_assignment("r3", "ps-1", PrincipalType::User, "alice", C)
            .fail("DELETE /permission-set-assignments/r1", 500, "locked")
            .fail("DELETE /permission-set-assignments/r2", 409, "conflict");
        let id: CompositeId = "r1,r2,r3".parse().unwrap();

        let err = delete_assignment(&api, &id).unwrap_err();
        match &err {
            ReconcileError::Delete { failures } => assert_eq!(failures.len(), 2),
            other => panic!("unexpected error: {}", other),
        }
        assert!(api.assignment("r3").is_none());
        assert!(err.to_string().contains("assignment r1: API error (500): locked"));
    }

    #[test]
    fn test_purge_deletes_only_referencing_rows() {
        let api = seeded()
            .with_permission_set("ps-2", "ReadOnly")
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .with_assignment("r2", "ps-1", PrincipalType::Group, "ops", B)
            .with_assignment("r3", "ps-2", PrincipalType::User, "alice", A);

        let report = purge_assignments(
            &api,
            &OpContext::background(),
            fast_policy(),
            CascadeParent::PermissionSet("ps-1"),
        );

        assert_eq!(report.deleted, vec!["r1", "r2"]);
        assert_eq!(api.count_calls_with_prefix("DELETE /permission-set-assignments/"), 2);
        assert!(api.assignment("r3").is_some());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].summary, "Automatic Assignment Cleanup");
        assert!(report.warnings[0].detail.contains("permission set ps-1"));
    }

    #[test]
    fn test_purge_by_account() {
        let api = seeded()
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .with_assignment("r2", "ps-1", PrincipalType::User, "alice", B);

        let report =
            purge_assignments(&api, &OpContext::background(), fast_policy(), CascadeParent::Account(B));
        assert_eq!(report.deleted, vec!["r2"]);
    }

    #[test]
    fn test_purge_without_references_is_quiet() {
        let api = seeded();
        let report =
            purge_assignments(&api, &OpContext::background(), fast_policy(), CascadeParent::Account(A));

        assert!(report.deleted.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(api.count_calls_with_prefix("GET /permission-set-assignments/"), 0);
    }

    #[test]
    fn test_purge_list_failure_is_a_warning() {
        let api = seeded().fail("GET /permission-set-assignments", 503, "unavailable");
        let report =
            purge_assignments(&api, &OpContext::background(), fast_policy(), CascadeParent::Account(A));

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].summary, "Unable to List Assignments");
    }

    #[test]
    fn test_purge_collects_delete_failures() {
        let api = seeded()
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .with_assignment("r2", "ps-1", PrincipalType::User, "alice", A)
            .fail("DELETE /permission-set-assignments/r1", 500, "locked");

        let report =
            purge_assignments(&api, &OpContext::background(), fast_policy(), CascadeParent::Account(A));

        assert_eq!(report.deleted, vec!["r2"]);
        let summaries: Vec<_> = report.warnings.iter().map(|w| w.summary).collect();
        assert_eq!(
            summaries,
            vec!["Failed to Delete Some Assignments", "Automatic Assignment Cleanup"]
        );
    }

    #[test]
    fn test_purge_waits_for_lingering_rows() {
        let api = seeded()
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .linger_after_delete("r1", 2);

        let report =
            purge_assignments(&api, &OpContext::background(), fast_policy(), CascadeParent::Account(A));

        assert_eq!(api.count_calls("GET /permission-set-assignments/r1"), 3);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.interrupted.is_none());
    }

    #[test]
    fn test_purge_times_out_with_warning() {
        let api = seeded()
            .with_assignment("r1", "ps-1", PrincipalType::User, "alice", A)
            .linger_after_delete("r1", u32::MAX);

        let report =
            purge_assignments(&api, &OpContext::background(), fast_policy(), CascadeParent::Account(A));

        let last = report.warnings.last().unwrap();
        assert_eq!(last.summary, "Assignment Deletion Timeout");
        assert!(last.detail.ends_with("Account deletion may fail."));
    }
}
