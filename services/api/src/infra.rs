use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use practice_portal::workflows::practice::{
    NotificationError, NotificationService, StatusChangeNotice, StudentContact, StudentDirectory,
    StudentId,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) const DEFAULT_EMAIL_DOMAIN: &str = "students.example.edu";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Transport used until an SMTP relay is wired in: every notice becomes a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LoggingNotifier;

impl NotificationService for LoggingNotifier {
    fn notify_status_change(&self, notice: StatusChangeNotice) -> Result<(), NotificationError> {
        info!(
            application_id = %notice.application_id,
            to = %notice.student_email,
            status = notice.new_status.label(),
            comments = notice.comments.as_deref().unwrap_or(""),
            summary = %notice.application_summary,
            "status change e-mail queued"
        );
        Ok(())
    }
}

/// Student ids double as institutional mailbox names.
#[derive(Debug, Clone)]
pub(crate) struct EmailDomainDirectory {
    domain: String,
}

impl EmailDomainDirectory {
    pub(crate) fn new(domain: Option<String>) -> Self {
        let domain = domain
            .map(|raw| raw.trim().trim_start_matches('@').to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string());
        Self { domain }
    }
}

impl StudentDirectory for EmailDomainDirectory {
    fn contact(&self, student_id: &StudentId) -> Option<StudentContact> {
        let mailbox = student_id.0.trim();
        if mailbox.is_empty() {
            return None;
        }
        Some(StudentContact {
            email: format!("{mailbox}@{}", self.domain),
            display_name: mailbox.to_string(),
        })
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_builds_addresses_from_student_ids() {
        let directory = EmailDomainDirectory::new(Some("@uni.example.org".to_string()));
        let contact = directory
            .contact(&StudentId("m.rojas".to_string()))
            .expect("contact");
        assert_eq!(contact.email, "m.rojas@uni.example.org");
        assert_eq!(contact.display_name, "m.rojas");

        assert!(directory.contact(&StudentId("  ".to_string())).is_none());
    }

    #[test]
    fn directory_falls_back_to_default_domain() {
        let directory = EmailDomainDirectory::new(Some(" ".to_string()));
        let contact = directory
            .contact(&StudentId("ana".to_string()))
            .expect("contact");
        assert_eq!(contact.email, format!("ana@{DEFAULT_EMAIL_DOMAIN}"));
    }

    #[test]
    fn parse_date_reports_bad_input() {
        assert_eq!(
            parse_date("2025-03-01"),
            Ok(NaiveDate::from_ymd_opt(2025, 3, 1).expect("valid"))
        );
        assert!(parse_date("03/01/2025").is_err());
    }
}
