use std::sync::Arc;

use bytes::Bytes;
use litagent_stream::{
    ByteSource, GenerationRequest, Generator, GeneratorError, SessionEvent, SessionFailure,
    SessionPhase, StageStatus, Transport, TransportError, TransportId,
};
use pretty_assertions::assert_eq;

/// Replays fixed chunks for every request.
struct ScriptedTransport {
    chunks: Vec<Bytes>,
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    fn id(&self) -> TransportId {
        TransportId::new("scripted")
    }

    async fn open(&self, _request: &GenerationRequest) -> Result<ByteSource, TransportError> {
        let chunks: Vec<Result<Bytes, TransportError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

fn generator_over(chunks: Vec<Bytes>) -> Generator {
    Generator::builder()
        .transport(Arc::new(ScriptedTransport { chunks }))
        .build()
        .expect("generator")
}

fn generator(chunks: Vec<&'static str>) -> Generator {
    generator_over(
        chunks
            .into_iter()
            .map(|c| Bytes::from_static(c.as_bytes()))
            .collect(),
    )
}

#[tokio::test]
async fn happy_path_across_split_chunks() {
    let mut generator = generator(vec![
        "data: {\"stage\":\"researcher\",\"status\":\"start\",\"message\":\"Researching...\"}\n",
        "\ndata: {\"stage\":\"researcher\",\"status\":\"streaming\",\"delta\":\"Fact 1\"}\n\n",
        "data: {\"stage\":\"researcher\",\"status\":\"complete\",\"content\":\"Fact 1 done\"}\n\ndata: {\"stage\":\"done\",\"final_article\":\"ARTICLE\"}\n\ndata: [DONE]\n\n",
    ]);

    let state = generator
        .generate("batteries")
        .run_to_end()
        .await
        .expect("state");

    assert_eq!(state.phase, SessionPhase::Done);
    assert_eq!(state.final_artifact.as_deref(), Some("ARTICLE"));
    let researcher = state.stage("researcher").expect("researcher");
    assert_eq!(researcher.status, StageStatus::Complete);
    assert_eq!(researcher.streaming_text, "Fact 1 done");
    assert_eq!(researcher.complete_text, "Fact 1 done");
    assert_eq!(state.current_stage, Some("researcher".into()));
}

#[tokio::test]
async fn malformed_payload_yields_one_diagnostic() {
    let mut generator = generator(vec![
        "data: {\"stage\":\"writer\",\"status\":\"start\"}\n\n",
        "data: {not json}\n\n",
        "data: {\"stage\":\"writer\",\"status\":\"streaming\",\"delta\":\"ok\"}\n\n",
        "data: {\"stage\":\"done\",\"final_article\":\"A\"}\n\ndata: [DONE]\n\n",
    ]);

    let mut stream = generator
        .generate("topic")
        .start_stream()
        .await
        .expect("stream");
    let mut diagnostics = 0;
    while let Some(event) = stream.next_event().await {
        if let SessionEvent::Diagnostic { raw, .. } = event {
            assert_eq!(raw, "{not json}");
            diagnostics += 1;
        }
    }
    assert_eq!(diagnostics, 1);

    let state = stream.finish().await.expect("state");
    assert_eq!(state.phase, SessionPhase::Done);
    assert_eq!(state.stage("writer").expect("writer").streaming_text, "ok");
}

#[tokio::test]
async fn stream_closing_after_start_is_errored() {
    let mut generator = generator(vec![
        "data: {\"stage\":\"researcher\",\"status\":\"start\",\"message\":\"m\"}\n\n",
    ]);

    let state = generator.generate("topic").run_to_end().await.expect("state");
    assert_eq!(state.phase, SessionPhase::Errored);
    assert_eq!(state.final_artifact, None);
    assert_eq!(state.failure, Some(SessionFailure::UnexpectedEnd));

    let err = generator
        .generate("topic")
        .collect_article()
        .await
        .expect_err("errored session");
    assert_eq!(err, GeneratorError::Failed(SessionFailure::UnexpectedEnd));
}

#[tokio::test]
async fn cancelling_a_finished_session_changes_nothing() {
    let mut generator = generator(vec![
        "data: {\"stage\":\"done\",\"final_article\":\"A\"}\n\ndata: [DONE]\n\n",
    ]);

    let stream = generator.generate("topic").start_stream().await.expect("stream");
    let token = stream.cancel_token();
    let state = stream.finish().await.expect("state");
    assert_eq!(state.phase, SessionPhase::Done);

    assert!(token.cancel());
    assert!(!generator.stop());
    assert_eq!(state.final_artifact.as_deref(), Some("A"));
}

#[tokio::test]
async fn session_result_does_not_depend_on_chunking() {
    let body = concat!(
        "data: {\"stage\":\"researcher\",\"status\":\"start\",\"message\":\"正在搜索\"}\n\n",
        "data: {\"stage\":\"researcher\",\"status\":\"streaming\",\"delta\":\" 🔋 données\"}\r\n\r\n",
        ": keep-alive\n\n",
        "data: not-json\n\n",
        "data: {\"stage\":\"researcher\",\"status\":\"complete\",\"content\":\"资料\"}\n\n",
        "data: {\"stage\":\"writer\",\"status\":\"streaming\",\"delta\":\"Ωmega\"}\n\n",
        "data: {\"stage\":\"done\",\"final_article\":\"文章 — fin\"}\n\n",
        "data: [DONE]\n\n",
    );

    let whole = generator_over(vec![Bytes::from_static(body.as_bytes())])
        .generate("topic")
        .run_to_end()
        .await
        .expect("single chunk");
    let bytewise = generator_over(
        body.as_bytes()
            .iter()
            .map(|b| Bytes::copy_from_slice(&[*b]))
            .collect(),
    )
    .generate("topic")
    .run_to_end()
    .await
    .expect("bytewise");

    assert_eq!(bytewise, whole);
    assert_eq!(whole.phase, SessionPhase::Done);
    assert_eq!(whole.final_artifact.as_deref(), Some("文章 — fin"));
    assert_eq!(whole.stage("researcher").expect("researcher").complete_text, "资料");
    assert_eq!(whole.stage("writer").expect("writer").streaming_text, "Ωmega");
}
