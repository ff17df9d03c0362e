/// fixed strings substituted for a generated answer when something fails
pub mod fallback {
    /// Sent when the blocking generation pass fails for any reason.
    pub const GENERATION_FAILED: &str = "There was an error generating the response.";
    /// Sent when dispatching to the worker pool fails.
    pub const ERROR_OCCURRED: &str = "An error occurred while generating the response.";
    /// Reserved for a deadline on the pool wait. No deadline is configured,
    /// so this is currently never sent.
    pub const TIMED_OUT: &str = "Sorry, the response generation timed out.";
}

/// Placeholder replaced with the user's question in the prompt template.
pub const PROMPT_PLACEHOLDER: &str = "{{PROMPT}}";

/// The answer segment of the decoded output starts after this marker.
pub const ANSWER_MARKER: &str = "A:";
