use std::path::PathBuf;

use tokio::sync::RwLock;

/// Built-in system prompt, used when no other layer provides one.
pub const DEFAULT_PROMPT: &str = "\
You are a fierce political debater. When given a political or public statement, \
you must take the **opposite** position and argue against it as strongly and \
convincingly as possible.

Rules:
- Be direct, sharp, and unapologetic in your counter-argument.
- Use facts, logic, and rhetoric to dismantle the original statement.
- Keep your reply concise — no longer than 2-3 short paragraphs, suitable for a \
Telegram message.
- Do NOT use hedging language like \"on the other hand\" or \"some might say\". \
State your opposing view as absolute truth.
- Match the language of the original message (if it's in Ukrainian, reply in \
Ukrainian; if English, reply in English; etc.).";

/// System prompt with layered lookup:
/// runtime override > environment variable > prompt file > built-in default.
///
/// Only the runtime layer is stored; the environment and file layers are
/// consulted fresh on every read, so an operator can swap the prompt file or
/// restart with a different environment without the process caching a stale
/// value. Admin commands are the single writer; readers never hold the lock
/// across an await.
pub struct PromptStore {
    env_var: String,
    file_path: PathBuf,
    runtime: RwLock<Option<String>>,
}

impl PromptStore {
    pub fn new(env_var: impl Into<String>, file_path: PathBuf) -> Self {
        Self {
            env_var: env_var.into(),
            file_path,
            runtime: RwLock::new(None),
        }
    }

    /// Current prompt after evaluating the full precedence chain.
    pub async fn get(&self) -> String {
        if let Some(prompt) = self.runtime.read().await.as_ref() {
            return prompt.clone();
        }

        if let Ok(value) = std::env::var(&self.env_var) {
            if !value.trim().is_empty() {
                return value;
            }
        }

        if let Ok(contents) = std::fs::read_to_string(&self.file_path) {
            let trimmed = contents.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }

        DEFAULT_PROMPT.to_string()
    }

    /// Install a runtime override; wins over every other layer until reset.
    pub async fn set(&self, prompt: String) {
        *self.runtime.write().await = Some(prompt);
    }

    /// Drop the runtime override so lookup falls back to env/file/default.
    pub async fn reset(&self) {
        *self.runtime.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(env_var: &str, file_path: PathBuf) -> PromptStore {
        PromptStore::new(env_var, file_path)
    }

    #[tokio::test]
    async fn falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let s = store("COUNTERBOT_TEST_PROMPT_UNSET", dir.path().join("missing.txt"));

        assert_eq!(s.get().await, DEFAULT_PROMPT);
    }

    #[tokio::test]
    async fn file_layer_beats_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "file prompt\n").unwrap();
        let s = store("COUNTERBOT_TEST_PROMPT_UNSET", path);

        assert_eq!(s.get().await, "file prompt");
    }

    #[tokio::test]
    async fn blank_file_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "   \n").unwrap();
        let s = store("COUNTERBOT_TEST_PROMPT_UNSET", path);

        assert_eq!(s.get().await, DEFAULT_PROMPT);
    }

    #[tokio::test]
    async fn env_layer_beats_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "file prompt").unwrap();
        std::env::set_var("COUNTERBOT_TEST_PROMPT_ENV", "env prompt");
        let s = store("COUNTERBOT_TEST_PROMPT_ENV", path);

        assert_eq!(s.get().await, "env prompt");
    }

    #[tokio::test]
    async fn runtime_override_beats_everything_until_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "file prompt").unwrap();
        std::env::set_var("COUNTERBOT_TEST_PROMPT_RUNTIME", "env prompt");
        let s = store("COUNTERBOT_TEST_PROMPT_RUNTIME", path);

        s.set("runtime prompt".to_string()).await;
        assert_eq!(s.get().await, "runtime prompt");

        s.reset().await;
        assert_eq!(s.get().await, "env prompt");
    }

    #[tokio::test]
    async fn reads_are_idempotent_without_mutation() {
        let dir = tempfile::tempdir().unwrap();
        let s = store("COUNTERBOT_TEST_PROMPT_IDEM", dir.path().join("missing.txt"));

        assert_eq!(s.get().await, s.get().await);
    }

    #[tokio::test]
    async fn file_layer_is_read_fresh_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.txt");
        std::fs::write(&path, "first").unwrap();
        let s = store("COUNTERBOT_TEST_PROMPT_FRESH", path.clone());

        assert_eq!(s.get().await, "first");
        std::fs::write(&path, "second").unwrap();
        assert_eq!(s.get().await, "second");
    }
}
