// Feedback prompt. Fixed by product decision; not configurable per request.

use crate::feedback::extract::ExtractedText;
use crate::llm_client::CompletionRequest;

/// Persona: a dental clinic hiring manager who has hired many hygienists,
/// asked for three specific, friendly improvement points on the résumé.
pub const FEEDBACK_SYSTEM: &str = "\
당신은 치과 병원에서 위생사를 채용한 경험이 많은 인사담당자입니다. \
다음 이력서를 읽고, 위생사 입장에서 더 좋게 개선할 수 있는 방향을 구체적으로 알려주세요. \
친절한 문장으로, 포인트만 3가지로 요약해주세요.";

/// Pairs the fixed system instruction with the résumé text, passed through as-is.
pub fn build_feedback_request(text: &ExtractedText) -> CompletionRequest {
    CompletionRequest::new(FEEDBACK_SYSTEM, text.as_str())
}
