//! `Journal` handlers: create, fetch, metadata updates, issue list
//! operations, ahead-of-print bundle component — grounded on
//! `services.py`'s `CreateJournal`/`FetchJournal`/`UpdateJournalMetadata`/
//! `AddIssueToJournal`/`InsertIssueToJournal`/`RemoveIssueFromJournal`/
//! `UpdateIssuesInJournal`/`SetAheadOfPrintBundleToJournal`/
//! `RemoveAheadOfPrintBundleFromJournal` (spec §4.3, §4.7).

use serde_json::{
    json,
    Map,
    Value,
};

use errors::KernelError;
use manifest::Timestamp;
use model::Journal;
use storage::Repository;

use crate::{
    events::Event,
    Handlers,
};

fn expect_str<'a>(field: &'static str, value: &'a Value) -> Result<&'a str, KernelError> {
    value
        .as_str()
        .ok_or_else(|| KernelError::InvalidMetadata { field, reason: "expected a string".to_string() })
}

fn expect_string_array(field: &'static str, value: &Value) -> Result<Vec<String>, KernelError> {
    let Value::Array(items) = value else {
        return Err(KernelError::InvalidMetadata { field, reason: "expected an array of strings".to_string() });
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| KernelError::InvalidMetadata { field, reason: "expected an array of strings".to_string() })
        })
        .collect()
}

fn expect_object_array(field: &'static str, value: &Value) -> Result<Vec<Map<String, Value>>, KernelError> {
    let Value::Array(items) = value else {
        return Err(KernelError::InvalidMetadata { field, reason: "expected an array of objects".to_string() });
    };
    items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => Ok(obj.clone()),
            _ => Err(KernelError::InvalidMetadata { field, reason: "expected an array of objects".to_string() }),
        })
        .collect()
}

fn expect_object(field: &'static str, value: &Value) -> Result<Map<String, Value>, KernelError> {
    match value {
        Value::Object(obj) => Ok(obj.clone()),
        _ => Err(KernelError::InvalidMetadata { field, reason: "expected an object".to_string() }),
    }
}

/// Applies a `{field: value}` metadata bag to a journal via its typed
/// accessors, mirroring the original's generic `setattr` loop over
/// `Journal`'s many properties (spec §4.3's "NEW" accessor list).
fn apply_metadata(journal: &mut Journal, metadata: &Map<String, Value>) -> Result<(), KernelError> {
    for (name, value) in metadata {
        match name.as_str() {
            "mission" => journal.set_mission(expect_object_array(name, value)?, Timestamp::now),
            "title" => journal.set_title(expect_str(name, value)?, Timestamp::now),
            "title_iso" => journal.set_title_iso(expect_str(name, value)?, Timestamp::now),
            "short_title" => journal.set_short_title(expect_str(name, value)?, Timestamp::now),
            "acronym" => journal.set_acronym(expect_str(name, value)?, Timestamp::now),
            "scielo_issn" => journal.set_scielo_issn(expect_str(name, value)?, Timestamp::now),
            "print_issn" => journal.set_print_issn(expect_str(name, value)?, Timestamp::now),
            "electronic_issn" => journal.set_electronic_issn(expect_str(name, value)?, Timestamp::now),
            "status" => journal.set_status(expect_object(name, value)?, Timestamp::now),
            "subject_areas" => journal.set_subject_areas(&expect_string_array(name, value)?, Timestamp::now)?,
            "sponsors" => journal.set_sponsors(expect_object_array(name, value)?, Timestamp::now),
            "subject_categories" => journal.set_subject_categories(&expect_string_array(name, value)?, Timestamp::now),
            "institution_responsible_for" => {
                journal.set_institution_responsible_for(expect_object_array(name, value)?, Timestamp::now)
            },
            "online_submission_url" => journal.set_online_submission_url(expect_str(name, value)?, Timestamp::now),
            "next_journal" => journal.set_next_journal(expect_object(name, value)?, Timestamp::now),
            "previous_journal" => journal.set_previous_journal(expect_object(name, value)?, Timestamp::now),
            "contact" => journal.set_contact(expect_object(name, value)?, Timestamp::now),
            "provisional" => journal.set_provisional(expect_str(name, value)?, Timestamp::now),
            other => {
                return Err(KernelError::InvalidMetadata {
                    field: "metadata",
                    reason: format!("unknown journal metadata field \"{other}\""),
                })
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_a_mix_of_known_fields() {
        let mut journal = Journal::new("journal-1", Timestamp::now);
        let metadata = json!({
            "title": "A Journal",
            "acronym": "aj",
            "subject_areas": ["Health Sciences"],
            "status": {"status": "current"},
        })
        .as_object()
        .unwrap()
        .clone();

        apply_metadata(&mut journal, &metadata).unwrap();
    }

    #[test]
    fn rejects_unknown_fields() {
        let mut journal = Journal::new("journal-1", Timestamp::now);
        let metadata = json!({"not_a_real_field": "x"}).as_object().unwrap().clone();

        let err = apply_metadata(&mut journal, &metadata).unwrap_err();
        match err {
            KernelError::InvalidMetadata { field, reason } => {
                assert_eq!(field, "metadata");
                assert!(reason.contains("not_a_real_field"));
            },
            other => panic!("expected InvalidMetadata, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_subject_area_outside_the_controlled_vocabulary() {
        let mut journal = Journal::new("journal-1", Timestamp::now);
        let metadata = json!({"subject_areas": ["Not A Real Area"]}).as_object().unwrap().clone();

        assert!(apply_metadata(&mut journal, &metadata).is_err());
    }

    #[test]
    fn rejects_non_object_values_for_object_fields() {
        let mut journal = Journal::new("journal-1", Timestamp::now);
        let metadata = json!({"status": "current"}).as_object().unwrap().clone();

        let err = apply_metadata(&mut journal, &metadata).unwrap_err();
        assert!(matches!(err, KernelError::InvalidMetadata { field: "status", .. }));
    }
}

impl Handlers {
    pub async fn create_journal(&self, id: &str, metadata: &Map<String, Value>) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = Journal::new(id, Timestamp::now);
        apply_metadata(&mut journal, metadata)?;
        session.journals.add(&journal).await?;
        session.notify(Event::JournalCreated, json!({"id": id, "timestamp": journal.updated().to_string()})).await;
        Ok(())
    }

    pub async fn fetch_journal(&self, id: &str) -> Result<Value, KernelError> {
        let session = self.session().await?;
        Ok(session.journals.fetch(id).await?.data())
    }

    pub async fn update_journal_metadata(&self, id: &str, metadata: &Map<String, Value>) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        apply_metadata(&mut journal, metadata)?;
        session.journals.update(&journal).await?;
        session
            .notify(Event::JournalMetadataUpdated, json!({"id": id, "timestamp": journal.updated().to_string()}))
            .await;
        Ok(())
    }

    pub async fn add_issue_to_journal(&self, id: &str, issue: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        journal.add_issue(issue, Timestamp::now)?;
        session.journals.update(&journal).await?;
        session
            .notify(Event::IssueAddedToJournal, json!({"id": id, "issue": issue, "timestamp": journal.updated().to_string()}))
            .await;
        Ok(())
    }

    pub async fn insert_issue_to_journal(&self, id: &str, index: i64, issue: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        journal.insert_issue(index, issue, Timestamp::now)?;
        session.journals.update(&journal).await?;
        session
            .notify(
                Event::IssueInsertedToJournal,
                json!({"id": id, "issue": issue, "index": index, "timestamp": journal.updated().to_string()}),
            )
            .await;
        Ok(())
    }

    pub async fn remove_issue_from_journal(&self, id: &str, issue: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        journal.remove_issue(issue, Timestamp::now)?;
        session.journals.update(&journal).await?;
        session
            .notify(
                Event::IssueRemovedFromJournal,
                json!({"id": id, "issue": issue, "timestamp": journal.updated().to_string()}),
            )
            .await;
        Ok(())
    }

    /// Replaces the journal's whole issue list: logically `remove_all;
    /// add_each(issues)`, matching `UpdateIssuesInJournal`.
    pub async fn update_issues_in_journal(&self, id: &str, issues: &[String]) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        journal.update_issues(issues, Timestamp::now)?;
        session.journals.update(&journal).await?;
        session
            .notify(Event::JournalIssuesUpdated, json!({"id": id, "timestamp": journal.updated().to_string()}))
            .await;
        Ok(())
    }

    pub async fn set_ahead_of_print_bundle_to_journal(&self, id: &str, aop: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        journal.set_ahead_of_print_bundle(aop, Timestamp::now);
        session.journals.update(&journal).await?;
        session
            .notify(
                Event::AheadOfPrintBundleSetToJournal,
                json!({"id": id, "aop": aop, "timestamp": journal.updated().to_string()}),
            )
            .await;
        Ok(())
    }

    pub async fn remove_ahead_of_print_bundle_from_journal(&self, id: &str) -> Result<(), KernelError> {
        let session = self.session().await?;
        let mut journal = session.journals.fetch(id).await?;
        journal.remove_ahead_of_print_bundle()?;
        session.journals.update(&journal).await?;
        session
            .notify(
                Event::AheadOfPrintBundleRemovedFromJournal,
                json!({"id": id, "timestamp": journal.updated().to_string()}),
            )
            .await;
        Ok(())
    }
}
