use crate::infra::{parse_date, EmailDomainDirectory};
use chrono::{Local, NaiveDate};
use clap::Args;
use practice_portal::error::AppError;
use practice_portal::workflows::practice::{
    ApplicationStatus, Document, DocumentId, DocumentKind, DocumentStatus, InMemoryPracticeStore,
    Internship, NewApplication, NewInternship, NotificationError, NotificationService,
    PracticeApplication, PracticeApplicationService, PracticeConfig, PracticeError, PracticeStore,
    PracticeTarget, SqlitePracticeStore, StatusChangeNotice, StudentId, TrackingScope,
    TransitionOutcome, TransitionRequest,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

const COORDINATOR: &str = "coordinator-demo";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Application deadline for the demo internship (YYYY-MM-DD). Defaults to 30 days out.
    #[arg(long, value_parser = parse_date)]
    pub(crate) deadline: Option<NaiveDate>,
    /// Passing threshold used when closing the demo application.
    #[arg(long)]
    pub(crate) min_average: Option<f64>,
    /// Run the demo against a SQLite file instead of process memory.
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

/// Prints notices inline so the demo output shows what students would receive.
struct ConsoleNotifier;

impl NotificationService for ConsoleNotifier {
    fn notify_status_change(&self, notice: StatusChangeNotice) -> Result<(), NotificationError> {
        match &notice.comments {
            Some(comments) => println!(
                "    e-mail to {}: {} is now {} ({})",
                notice.student_email, notice.application_summary, notice.new_status, comments
            ),
            None => println!(
                "    e-mail to {}: {} is now {}",
                notice.student_email, notice.application_summary, notice.new_status
            ),
        }
        Ok(())
    }
}

type DemoService<S> = PracticeApplicationService<S, ConsoleNotifier, EmailDomainDirectory>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        deadline,
        min_average,
        database,
    } = args;

    let deadline =
        deadline.unwrap_or_else(|| Local::now().date_naive() + chrono::Duration::days(30));

    println!("Practice lifecycle demo");
    match database {
        Some(path) => {
            println!("Store: sqlite ({})", path.display());
            run_with_store(SqlitePracticeStore::open(&path)?, deadline, min_average)
        }
        None => {
            println!("Store: in-memory");
            run_with_store(InMemoryPracticeStore::new(), deadline, min_average)
        }
    }
}

fn run_with_store<S>(
    store: S,
    deadline: NaiveDate,
    min_average: Option<f64>,
) -> Result<(), AppError>
where
    S: PracticeStore + 'static,
{
    let service: DemoService<S> = PracticeApplicationService::new(
        Arc::new(store),
        Arc::new(ConsoleNotifier),
        Arc::new(EmailDomainDirectory::new(None)),
        PracticeConfig::default(),
    );

    let internship = service.register_internship(NewInternship {
        title: "Cloud operations intern".to_string(),
        company: "Acme Logistics".to_string(),
        total_slots: 1,
        application_deadline: deadline,
    })?;
    println!(
        "\nRegistered internship {} at {} ({} slot, deadline {})",
        internship.id, internship.company, internship.total_slots, internship.application_deadline
    );

    println!("\nCapacity");
    let ana = apply_existing(&service, "ana", &internship)?;
    let ben = apply_existing(&service, "ben", &internship)?;
    report_transition(&service, transition(&ana, ApplicationStatus::Accepted, None, false));
    report_transition(&service, transition(&ben, ApplicationStatus::Accepted, None, false));
    let slots = service.slot_availability(&internship.id)?;
    println!(
        "  Slots: {}/{} occupied, {} remaining",
        slots.occupied, slots.total, slots.remaining
    );
    report_transition(
        &service,
        transition(
            &ben,
            ApplicationStatus::Rejected,
            Some("No slots left in this cohort"),
            false,
        ),
    );

    println!("\nSecond acceptance for the same student");
    let mut metadata = BTreeMap::new();
    metadata.insert("company".to_string(), "Harbor Robotics".to_string());
    let ana_external = service.create_application(NewApplication {
        student_id: StudentId("ana".to_string()),
        target: PracticeTarget::External {
            internship_external_id: "EXT-2024-17".to_string(),
        },
        metadata,
    })?;
    report_transition(
        &service,
        transition(&ana_external, ApplicationStatus::Accepted, None, false),
    );
    report_transition(
        &service,
        transition(&ana_external, ApplicationStatus::Accepted, None, true),
    );

    println!("\nProgress tracking");
    let evaluations = [
        ("plan", DocumentKind::WorkPlan, 6.0, 30.0),
        ("progress", DocumentKind::ProgressReport, 5.0, 30.0),
        ("final", DocumentKind::FinalReport, 5.2, 40.0),
    ];
    for (id, kind, grade, weight) in evaluations {
        let mut document = Document::uploaded(
            DocumentId(format!("{}-{id}", ana.id)),
            ana.id.clone(),
            kind,
            "ana",
        );
        document.status = DocumentStatus::Approved;
        document.grade = Some(grade);
        document.weight = weight;
        let document = service.upsert_document(document)?;
        println!(
            "  {} graded {:.1} (weight {:.0}%)",
            document.kind.label(),
            grade,
            weight
        );
    }
    let tracking = service.tracking_average(TrackingScope::Application(ana.id.clone()))?;
    match tracking.average {
        Some(average) => println!(
            "  Tracking average {average:.2} over {:.0}% of the weight (complete: {})",
            tracking.total_weight, tracking.is_complete
        ),
        None => println!("  Tracking average unavailable"),
    }

    println!("\nClosure");
    match service.close_application(&ana.id, min_average) {
        Ok(closed) => print_closure(&closed),
        Err(err) => println!("  Closure refused: {err}"),
    }
    if let Err(err) = service.close_application(&ana.id, min_average) {
        println!("  Second closure refused: {err}");
    }

    Ok(())
}

fn apply_existing<S>(
    service: &DemoService<S>,
    student: &str,
    internship: &Internship,
) -> Result<PracticeApplication, PracticeError>
where
    S: PracticeStore + 'static,
{
    let application = service.create_application(NewApplication {
        student_id: StudentId(student.to_string()),
        target: PracticeTarget::Existing {
            internship_id: internship.id.clone(),
        },
        metadata: BTreeMap::new(),
    })?;
    println!("  {} applied: {}", student, application.id);
    Ok(application)
}

fn transition(
    application: &PracticeApplication,
    new_status: ApplicationStatus,
    comments: Option<&str>,
    force: bool,
) -> TransitionRequest {
    TransitionRequest {
        application_id: application.id.clone(),
        new_status,
        comments: comments.map(str::to_string),
        actor_id: COORDINATOR.to_string(),
        force,
    }
}

fn report_transition<S>(service: &DemoService<S>, request: TransitionRequest)
where
    S: PracticeStore + 'static,
{
    let target = request.new_status;
    let forced = if request.force { " (forced)" } else { "" };
    match service.transition(request) {
        Ok(TransitionOutcome::Applied(application)) => {
            println!("  {} -> {}{}", application.id, target, forced);
        }
        Ok(TransitionOutcome::Warning(warning)) => {
            println!("  Warning {}: {}", warning.code.code(), warning.message);
        }
        Err(err) => println!("  Refused: {err}"),
    }
}

fn print_closure(application: &PracticeApplication) {
    let average = application
        .final_average
        .map(|average| format!("{average:.1}"))
        .unwrap_or_else(|| "n/a".to_string());
    let result = application
        .final_result
        .map(|result| result.label())
        .unwrap_or("n/a");
    println!(
        "  {} closed with final average {} -> {}",
        application.id, average, result
    );
}
