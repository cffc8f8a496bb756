use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use visa_lead_engine::db::{LeadStore, NURTURING_DONE_STATUS};
use visa_lead_engine::forms::{form_block, FormIds, FormLinks, FormType};
use visa_lead_engine::models::{
    GraphBody, GraphEmailAddress, GraphMessage, GraphRecipient, Intent, LeadStatus, QuestionnaireStatus,
};
use visa_lead_engine::nlp::TextNormalizer;
use visa_lead_engine::reminders::ReminderClock;
use visa_lead_engine::reply::{CompletionClient, CompletionRequest, ReplyGenerator, ReplySettings};
use visa_lead_engine::service::{
    form_ack_text, LeadService, ServiceSettings, ThreadBuilder, FALLBACK_REPLY, FOLLOW_UP_FALLBACK,
};
use visa_lead_engine::{ProcessOutcome, ThreadAnalyzer};

mock! {
    Client {}

    #[async_trait]
    impl CompletionClient for Client {
        async fn complete(&self, request: &CompletionRequest) -> String;
    }
}

const OUR: &str = "RobotVisa@itplus.kz";
const FORWARD: &str = "specialist@example.com";
const POLAND_URL: &str = "https://forms.example.com/poland";

fn settings() -> ServiceSettings {
    ServiceSettings {
        mailbox_address: OUR.to_string(),
        form_links: FormLinks {
            poland: Some(POLAND_URL.to_string()),
            ..FormLinks::default()
        },
        form_ids: FormIds {
            poland: Some("form-pl".to_string()),
            ..FormIds::default()
        },
        ..ServiceSettings::default()
    }
}

fn service(dir: &TempDir, client: MockClient) -> LeadService {
    let settings = settings();
    let store = LeadStore::open(
        dir.path().join("leads.db"),
        Duration::from_secs(5),
        ReminderClock::default(),
    )
    .expect("Failed to open store");
    let replies = ReplyGenerator::new(Arc::new(client), ReplySettings::default())
        .expect("Failed to create generator");
    let threads = ThreadBuilder::new(
        settings.limits,
        Arc::new(TextNormalizer::new(8000).expect("Failed to create normalizer")),
    );
    LeadService::new(
        ThreadAnalyzer::with_defaults(FORWARD).expect("Failed to create analyzer"),
        replies,
        store,
        threads,
        settings,
    )
}

fn graph(id: &str, conversation: &str, from: &str, body: &str) -> GraphMessage {
    GraphMessage {
        id: Some(id.to_string()),
        conversation_id: Some(conversation.to_string()),
        subject: Some("Виза".to_string()),
        body: Some(GraphBody::Content {
            content: format!("<p>{body}</p>"),
        }),
        from: Some(GraphRecipient {
            email_address: GraphEmailAddress {
                address: from.to_string(),
                name: None,
            },
        }),
        ..GraphMessage::default()
    }
}

fn replying(text: &'static str, times: usize) -> MockClient {
    let mut client = MockClient::new();
    client
        .expect_complete()
        .times(times)
        .returning(move |_| text.to_string());
    client
}

#[tokio::test]
async fn test_poland_request_creates_lead_and_offers_form() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("Здравствуйте! Подскажите даты поездки.", 1));
    let message = graph("m-1", "c-1", "Client@Mail.kz", "Хочу оформить визу в Польшу");

    let outcome = service.process_incoming(&message, &[]).await.expect("pipeline");
    let ProcessOutcome::Reply {
        lead_id,
        intent,
        text,
        html,
        form,
    } = outcome
    else {
        panic!("expected a reply");
    };

    assert_eq!(intent, Intent::WantApply);
    assert_eq!(form, Some(FormType::Poland));
    assert!(text.starts_with("Здравствуйте! Подскажите даты поездки.\n\n"));
    assert!(text.ends_with(&form_block(FormType::Poland, &settings().form_links)));
    assert!(html.contains(POLAND_URL));

    let lead = service.store().get_by_id(lead_id).expect("query").expect("lead");
    assert_eq!(lead.from_address, "client@mail.kz");
    assert_eq!(lead.status(), LeadStatus::QuestionnaireSent);
    assert_eq!(lead.visa_country.as_deref(), Some("PL"));
    assert_eq!(lead.questionnaire_status, QuestionnaireStatus::Sent);
    assert_eq!(lead.questionnaire_form_id.as_deref(), Some("form-pl"));
    assert_eq!(lead.last_message_id.as_deref(), Some("m-1"));
    assert!(lead.next_reminder_at.is_some());

    let trail = service.store().audit_trail(lead_id).expect("trail");
    let events: Vec<&str> = trail.iter().map(|e| e.event.as_str()).collect();
    assert_eq!(events, ["schedule_first_reminder", "user_message", "bot_reply"]);
    assert_eq!(trail[2].details.as_deref(), Some("Intent: want_apply"));
    assert!(trail[1]
        .details
        .as_deref()
        .is_some_and(|d| d.contains("country=PL") && d.contains("form_code=poland")));
}

#[tokio::test]
async fn test_second_message_does_not_resend_form() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("Спасибо, ждём анкету.", 2));

    let first = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");
    let ProcessOutcome::Reply { lead_id, .. } =
        service.process_incoming(&first, &[]).await.expect("pipeline")
    else {
        panic!("expected a reply");
    };
    let scheduled = service
        .store()
        .get_by_id(lead_id)
        .expect("query")
        .and_then(|l| l.next_reminder_at);

    let second = graph("m-2", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу, когда подача?");
    let outcome = service
        .process_incoming(&second, &[first, second.clone()])
        .await
        .expect("pipeline");
    let ProcessOutcome::Reply {
        lead_id: again,
        text,
        form,
        ..
    } = outcome
    else {
        panic!("expected a reply");
    };

    assert_eq!(again, lead_id);
    assert_eq!(form, None);
    assert_eq!(text, "Спасибо, ждём анкету.");

    let lead = service.store().get_by_id(lead_id).expect("query").expect("lead");
    assert_eq!(lead.next_reminder_at, scheduled);
    assert_eq!(lead.last_message_id.as_deref(), Some("m-2"));
}

#[tokio::test]
async fn test_empty_reply_falls_back() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("", 1));
    let message = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");

    let outcome = service.process_incoming(&message, &[]).await.expect("pipeline");
    let ProcessOutcome::Reply { text, .. } = outcome else {
        panic!("expected a reply");
    };
    assert!(text.starts_with(FALLBACK_REPLY));
    assert!(text.contains(POLAND_URL));
}

#[tokio::test]
async fn test_own_and_anonymous_messages_are_skipped() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, MockClient::new());

    let own = graph("m-1", "c-1", "robotvisa@itplus.kz", "Здравствуйте!");
    assert!(matches!(
        service.process_incoming(&own, &[]).await.expect("pipeline"),
        ProcessOutcome::Skipped { .. }
    ));

    let mut anonymous = graph("m-2", "c-2", "", "Хочу визу");
    anonymous.from = None;
    assert!(matches!(
        service.process_incoming(&anonymous, &[]).await.expect("pipeline"),
        ProcessOutcome::Skipped { .. }
    ));
    assert!(service.store().get_by_conversation("c-1").expect("query").is_none());
}

#[tokio::test]
async fn test_non_standard_destination_is_forwarded() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, MockClient::new());
    let message = graph("m-1", "c-9", "client@mail.kz", "Хочу оформить визу в Лондон");

    let outcome = service.process_incoming(&message, &[]).await.expect("pipeline");
    assert_eq!(
        outcome,
        ProcessOutcome::Forward {
            lead_id: None,
            to: FORWARD.to_string(),
            reason: "non_standard_country".to_string(),
        }
    );
    assert!(service.store().get_by_conversation("c-9").expect("query").is_none());
}

#[tokio::test]
async fn test_complete_reminder_schedules_once_then_stops() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("Здравствуйте!", 1));
    let message = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");
    let ProcessOutcome::Reply { lead_id, .. } =
        service.process_incoming(&message, &[]).await.expect("pipeline")
    else {
        panic!("expected a reply");
    };
    let mut lead = service.store().get_by_id(lead_id).expect("query").expect("lead");

    service.complete_reminder(&mut lead, Utc::now()).expect("first follow-up");
    assert_eq!(lead.reminders_sent, 1);
    assert!(lead.next_reminder_at.is_some());

    service.complete_reminder(&mut lead, Utc::now()).expect("second follow-up");
    assert_eq!(lead.next_reminder_at, None);

    let stored = service.store().get_by_id(lead_id).expect("query").expect("lead");
    assert_eq!(stored.reminders_sent, 1);
    assert_eq!(stored.next_reminder_at, None);
    assert_eq!(stored.status, NURTURING_DONE_STATUS);
    let events: Vec<String> = service
        .store()
        .audit_trail(lead_id)
        .expect("trail")
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert!(events.ends_with(&["schedule_next_reminder".to_string(), "stop_reminders".to_string()]));
}

fn local_afternoon() -> DateTime<Utc> {
    // 13:00 at UTC+5
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).single().expect("valid time")
}

#[tokio::test]
async fn test_repeated_message_is_skipped() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("Здравствуйте!", 1));
    let message = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");

    let ProcessOutcome::Reply { lead_id, .. } =
        service.process_incoming(&message, &[]).await.expect("pipeline")
    else {
        panic!("expected a reply");
    };
    assert_eq!(
        service.process_incoming(&message, &[]).await.expect("pipeline"),
        ProcessOutcome::Skipped {
            reason: "message already processed".to_string(),
        }
    );

    let replies = service
        .store()
        .audit_trail(lead_id)
        .expect("trail")
        .into_iter()
        .filter(|e| e.event == "bot_reply")
        .count();
    assert_eq!(replies, 1);
}

#[tokio::test]
async fn test_follow_ups_run_two_stages_then_stop() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut client = MockClient::new();
    client
        .expect_complete()
        .withf(|request: &CompletionRequest| !request.messages[1].content.contains("generate_followup"))
        .times(1)
        .returning(|_| "Здравствуйте!".to_string());
    client
        .expect_complete()
        .withf(|request: &CompletionRequest| {
            let user = &request.messages[1].content;
            user.contains("generate_followup") && user.contains("Хочу оформить визу в Польшу")
        })
        .times(2)
        .returning(|_| String::new());
    let service = service(&dir, client);

    let message = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");
    let ProcessOutcome::Reply { lead_id, .. } =
        service.process_incoming(&message, &[]).await.expect("pipeline")
    else {
        panic!("expected a reply");
    };
    let thread = [message];
    let mut lead = service.store().get_by_id(lead_id).expect("query").expect("lead");

    let first = service
        .follow_up(&mut lead, &thread, local_afternoon())
        .await
        .expect("follow-up")
        .expect("within working hours");
    assert_eq!(first.stage, 1);
    assert_eq!(first.text, FOLLOW_UP_FALLBACK);
    assert_eq!(first.reply_to.as_deref(), Some("m-1"));
    assert_eq!(first.to, "client@mail.kz");
    assert_eq!(lead.reminders_sent, 1);
    assert!(lead.next_reminder_at.is_some());

    let second = service
        .follow_up(&mut lead, &thread, local_afternoon())
        .await
        .expect("follow-up")
        .expect("within working hours");
    assert_eq!(second.stage, 2);

    let stored = service.store().get_by_id(lead_id).expect("query").expect("lead");
    assert_eq!(stored.status, NURTURING_DONE_STATUS);
    assert_eq!(stored.next_reminder_at, None);
    assert!(service
        .store()
        .get_due_reminders(local_afternoon() + chrono::TimeDelta::days(30))
        .expect("due")
        .is_empty());
}

#[tokio::test]
async fn test_follow_up_waits_for_working_hours() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("Здравствуйте!", 1));
    let message = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");
    let ProcessOutcome::Reply { lead_id, .. } =
        service.process_incoming(&message, &[]).await.expect("pipeline")
    else {
        panic!("expected a reply");
    };
    let mut lead = service.store().get_by_id(lead_id).expect("query").expect("lead");
    let before = lead.clone();

    // 01:00 at UTC+5
    let night = Utc.with_ymd_and_hms(2025, 3, 10, 20, 0, 0).single().expect("valid time");
    assert!(service.follow_up(&mut lead, &[], night).await.expect("follow-up").is_none());
    assert_eq!(lead, before);
}

#[tokio::test]
async fn test_filled_questionnaires_are_acknowledged_once() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let service = service(&dir, replying("Здравствуйте!", 1));
    let message = graph("m-1", "c-1", "client@mail.kz", "Хочу оформить визу в Польшу");
    let ProcessOutcome::Reply { lead_id, .. } =
        service.process_incoming(&message, &[]).await.expect("pipeline")
    else {
        panic!("expected a reply");
    };
    assert!(service.acknowledge_forms(None).expect("acks").is_empty());

    let mut lead = service.store().get_by_id(lead_id).expect("query").expect("lead");
    lead.questionnaire_status = QuestionnaireStatus::Filled;
    service.store().save(&mut lead).expect("save");

    let acks = service.acknowledge_forms(None).expect("acks");
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].lead_id, lead_id);
    assert_eq!(acks[0].to, "client@mail.kz");
    assert_eq!(acks[0].reply_to.as_deref(), Some("m-1"));
    assert_eq!(acks[0].text, form_ack_text(None));
    assert!(service.store().get_by_id(lead_id).expect("query").expect("lead").form_ack_sent);

    assert!(service.acknowledge_forms(None).expect("acks").is_empty());
}
