use async_trait::async_trait;
use mockall::mock;
use std::sync::Arc;
use visa_lead_engine::forms::{ExistingForms, FormLinks};
use visa_lead_engine::models::Message;
use visa_lead_engine::reply::{CompletionClient, CompletionRequest, ReplyGenerator, ReplySettings};
use visa_lead_engine::ThreadAnalyzer;

mock! {
    Client {}

    #[async_trait]
    impl CompletionClient for Client {
        async fn complete(&self, request: &CompletionRequest) -> String;
    }
}

const OUR: &str = "RobotVisa@itplus.kz";

fn links() -> FormLinks {
    FormLinks {
        poland: Some("https://forms.example.com/poland".to_string()),
        generic: Some("https://forms.example.com/generic".to_string()),
        ..FormLinks::default()
    }
}

#[tokio::test]
async fn test_poland_thread_prompt_and_reply() {
    let analyzer = ThreadAnalyzer::with_defaults("specialist@example.com").expect("Failed to create analyzer");
    let messages = [
        Message::new("client@mail.kz", "Виза", "Хочу оформить визу в Польшу"),
        Message::new(OUR, "Re: Виза", "Здравствуйте! Уточните даты поездки."),
    ];
    let analysis = analyzer.analyze(&messages, OUR, None, &ExistingForms::none());

    let mut client = MockClient::new();
    client
        .expect_complete()
        .withf(|request: &CompletionRequest| {
            let user = &request.messages[1].content;
            request.messages[0].content.starts_with("Вы — ")
                && user.contains("Страна: PL")
                && user.contains("https://forms.example.com/poland")
                && user.contains("From: BCD TRAVEL <RobotVisa@itplus.kz>")
                && !user.contains("https://forms.example.com/generic")
        })
        .times(1)
        .returning(|_| "Добрый день! Пожалуйста, заполните анкету: [ссылка на анкету]\n".to_string());

    let generator = ReplyGenerator::new(Arc::new(client), ReplySettings::default())
        .expect("Failed to create generator");
    let reply = generator.generate(&messages, &analysis, &links(), None, None).await;

    assert_eq!(
        reply,
        "Добрый день! Пожалуйста, заполните анкету: https://forms.example.com/poland"
    );
}

#[tokio::test]
async fn test_non_standard_thread_gets_no_link() {
    let analyzer = ThreadAnalyzer::with_defaults("specialist@example.com").expect("Failed to create analyzer");
    let messages = [Message::new("client@mail.kz", "", "Хочу оформить визу в Лондон")];
    let analysis = analyzer.analyze(&messages, OUR, None, &ExistingForms::none());

    let mut client = MockClient::new();
    client
        .expect_complete()
        .withf(|request: &CompletionRequest| !request.messages[1].content.contains("https://forms.example.com"))
        .times(1)
        .returning(|_| "  Передаём ваш запрос специалисту. [ссылка]  ".to_string());

    let generator = ReplyGenerator::new(Arc::new(client), ReplySettings::default())
        .expect("Failed to create generator");
    let reply = generator.generate(&messages, &analysis, &links(), None, None).await;

    assert_eq!(reply, "Передаём ваш запрос специалисту. [ссылка]");
}
