//! Truncation detection and the single continuation retry.
//!
//! Providers cap completions at a low token budget, so answers sometimes
//! stop mid-sentence. The heuristic inspects the assembled text (markers
//! stripped); when it looks cut off, exactly one follow-up call asks the
//! model to continue without repeating, with a tighter timeout. A failed
//! continuation is swallowed and the partial answer returned as-is.

use super::markers::strip_control_markers;
use super::traits::{CallOptions, ChatMessage, ChatProvider, ChatRole};

/// Replies shorter than this are intentional quips or status lines, never
/// truncation.
const MIN_TRUNCATION_CHARS: usize = 10;
/// The missing-terminal-punctuation signal alone only counts on longer
/// texts; short complete answers often skip the full stop.
const MIN_UNPUNCTUATED_CHARS: usize = 60;

/// Error/status replies a provider may emit verbatim; never continued.
const STATUS_PREFIXES: [&str; 5] = ["OpenAI error", "Anthropic error", "Gemini error", "Errore", "Error"];

const TERMINAL_PUNCTUATION: [char; 6] = ['.', '!', '?', '…', '"', '»'];
const DANGLING_SEPARATORS: [char; 6] = [',', ':', ';', '-', '–', '—'];

pub fn looks_truncated(raw: &str) -> bool {
    let text = strip_control_markers(raw);
    let trimmed = text.trim();
    let char_count = trimmed.chars().count();

    if char_count < MIN_TRUNCATION_CHARS {
        return false;
    }
    if STATUS_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return false;
    }

    if trimmed.ends_with("...") || trimmed.ends_with('…') {
        return true;
    }

    let last_char = trimmed.chars().next_back().unwrap_or(' ');
    if DANGLING_SEPARATORS.contains(&last_char) {
        return true;
    }
    if TERMINAL_PUNCTUATION.contains(&last_char) {
        return false;
    }

    // No terminal punctuation from here on.
    let last_word = trimmed
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or("")
        .trim_matches(|c: char| !c.is_alphanumeric());
    if !last_word.is_empty() && last_word.chars().count() <= 3 {
        return true;
    }

    char_count >= MIN_UNPUNCTUATED_CHARS
}

/// Run the primary completion, then at most one continuation when the text
/// looks cut off. Continuation failures keep the partial text.
pub async fn complete_with_continuation(
    provider: &dyn ChatProvider,
    system_prompt: Option<&str>,
    messages: &[ChatMessage],
    opts: &CallOptions,
) -> anyhow::Result<String> {
    let first = provider.complete(system_prompt, messages, opts).await?;
    if !looks_truncated(&first) {
        return Ok(first);
    }

    tracing::info!(provider = provider.name(), "answer looks truncated, continuing once");

    let mut follow_up = messages.to_vec();
    follow_up.push(ChatMessage::new(ChatRole::Assistant, first.clone()));
    follow_up.push(ChatMessage::new(
        ChatRole::User,
        "Continue the answer exactly where it stopped. \
         Do not repeat anything already written.",
    ));

    match provider
        .complete(system_prompt, &follow_up, &opts.for_continuation())
        .await
    {
        Ok(rest) if !rest.trim().is_empty() => {
            Ok(format!("{} {}", first.trim_end(), rest.trim_start()))
        }
        Ok(_) => Ok(first),
        Err(e) => {
            tracing::warn!(provider = provider.name(), "continuation failed, keeping partial answer: {e}");
            Ok(first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[test]
    fn complete_sentence_is_not_truncated() {
        assert!(!looks_truncated("Il prezzo è di 5€."));
    }

    #[test]
    fn dangling_conjunction_is_truncated() {
        assert!(looks_truncated("Il prezzo è di 5€ e"));
    }

    #[test]
    fn very_short_text_is_never_truncated() {
        assert!(!looks_truncated("Ciao"));
        assert!(!looks_truncated("Ok,"));
    }

    #[test]
    fn ellipsis_ending_is_truncated() {
        assert!(looks_truncated("La ricetta prevede panna, latte e..."));
        assert!(looks_truncated("La ricetta prevede panna, latte e…"));
    }

    #[test]
    fn dangling_separator_is_truncated() {
        assert!(looks_truncated("Gli ingredienti principali sono:"));
        assert!(looks_truncated("Per prima cosa scalda il latte,"));
    }

    #[test]
    fn long_text_without_terminal_punctuation_is_truncated() {
        let text = "Questa è una spiegazione piuttosto lunga del procedimento che si interrompe senza punteggiatura finale perché il modello ha esaurito i token disponibili";
        assert!(looks_truncated(text));
    }

    #[test]
    fn status_reply_is_not_truncated() {
        assert!(!looks_truncated("Gemini error 503: model overloaded,"));
        assert!(!looks_truncated("Errore temporaneo del servizio,"));
    }

    #[test]
    fn markers_are_stripped_before_judging() {
        // Ends with a tag, but the visible text is a complete sentence.
        assert!(!looks_truncated(
            "Apri la scheda per saperne di più, ti aspetto! [[LINK:caffe.html]]"
        ));
    }

    // ── continuation flow ─────────────────────────────────────────

    struct ScriptedProvider {
        replies: Mutex<Vec<anyhow::Result<String>>>,
        calls: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn complete(
            &self,
            _system_prompt: Option<&str>,
            messages: &[ChatMessage],
            _opts: &CallOptions,
        ) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.replies.lock().unwrap().remove(0)
        }

        async fn list_models(&self) -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!([]))
        }
    }

    fn opts() -> CallOptions {
        CallOptions {
            model: "m".into(),
            temperature: 0.6,
            max_tokens: 260,
            timeout: Duration::from_secs(30),
        }
    }

    fn user(text: &str) -> Vec<ChatMessage> {
        vec![ChatMessage::new(ChatRole::User, text)]
    }

    #[tokio::test]
    async fn complete_answer_makes_one_call() {
        let p = ScriptedProvider::new(vec![Ok("Risposta completa e ben chiusa.".into())]);
        let text = complete_with_continuation(&p, None, &user("?"), &opts())
            .await
            .unwrap();
        assert_eq!(text, "Risposta completa e ben chiusa.");
        assert_eq!(p.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn truncated_answer_triggers_exactly_one_continuation() {
        let p = ScriptedProvider::new(vec![
            Ok("La miscela va mantecata a freddo insieme a".into()),
            Ok("panna fresca e zucchero invertito.".into()),
        ]);
        let text = complete_with_continuation(&p, None, &user("?"), &opts())
            .await
            .unwrap();
        assert_eq!(
            text,
            "La miscela va mantecata a freddo insieme a panna fresca e zucchero invertito."
        );

        let calls = p.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        // The follow-up carries the partial answer and the continue prompt.
        let follow_up = &calls[1];
        assert_eq!(follow_up[follow_up.len() - 2].role, ChatRole::Assistant);
        assert!(follow_up[follow_up.len() - 1].content.contains("Do not repeat"));
    }

    #[tokio::test]
    async fn continuation_failure_keeps_partial_text() {
        let p = ScriptedProvider::new(vec![
            Ok("La miscela va mantecata a freddo insieme a".into()),
            Err(anyhow::anyhow!("timeout")),
        ]);
        let text = complete_with_continuation(&p, None, &user("?"), &opts())
            .await
            .unwrap();
        assert_eq!(text, "La miscela va mantecata a freddo insieme a");
    }

    #[tokio::test]
    async fn primary_failure_propagates() {
        let p = ScriptedProvider::new(vec![Err(anyhow::anyhow!("upstream 500"))]);
        assert!(
            complete_with_continuation(&p, None, &user("?"), &opts())
                .await
                .is_err()
        );
    }
}
