use std::{sync::Arc, thread::JoinHandle};

use rand::SeedableRng;
use thiserror::Error;

use crate::{config, constant};

#[derive(Debug, Error, Clone)]
pub enum InferenceError {
    #[error("{0}")]
    Custom(String),
}
impl InferenceError {
    pub fn custom(s: impl Into<String>) -> Self {
        Self::Custom(s.into())
    }
}

/// A single question queued for the worker pool. The reply channel is the
/// requester's promise; the worker that picks the request up sends exactly
/// one response on it.
pub struct Request {
    pub question: String,
    pub reply_tx: flume::Sender<String>,
}

/// Spawns the fixed-size pool of generation workers. All workers share the
/// request receiver; flume hands each request to exactly one idle worker.
/// The threads exit once every sender for `request_rx` is dropped.
pub fn make_pool(
    model: Arc<dyn llm::Model>,
    inference: config::Inference,
    request_rx: flume::Receiver<Request>,
) -> Vec<JoinHandle<()>> {
    (0..inference.worker_count)
        .map(|_| {
            let model = model.clone();
            let inference = inference.clone();
            let request_rx = request_rx.clone();
            std::thread::spawn(move || {
                worker_loop(&request_rx, |question| {
                    generate(model.as_ref(), &inference, question)
                })
            })
        })
        .collect()
}

fn worker_loop(request_rx: &flume::Receiver<Request>, mut respond: impl FnMut(&str) -> String) {
    while let Ok(request) = request_rx.recv() {
        let response = respond(&request.question);
        if request.reply_tx.send(response).is_err() {
            eprintln!("Failed to send response: requester went away");
        }
    }
}

/// Runs one blocking generation pass for `question` and returns the
/// extracted answer. Never fails: any error from the backend is logged and
/// replaced with the fallback string.
pub fn generate(model: &dyn llm::Model, inference: &config::Inference, question: &str) -> String {
    println!("Generating response for question: {question}");
    finish(try_generate(model, inference, question))
}

fn finish(result: Result<String, InferenceError>) -> String {
    match result {
        Ok(response) => {
            println!("Generated response: {response}");
            response
        }
        Err(err) => {
            eprintln!("Error during response generation: {err}");
            constant::fallback::GENERATION_FAILED.to_string()
        }
    }
}

fn try_generate(
    model: &dyn llm::Model,
    inference: &config::Inference,
    question: &str,
) -> Result<String, InferenceError> {
    let prompt = inference
        .prompt_template
        .replace(constant::PROMPT_PLACEHOLDER, question);

    let mut rng = rand::rngs::StdRng::from_entropy();
    let mut session = model.start_session(Default::default());

    let params = llm::InferenceParameters {
        n_threads: inference.thread_count,
        n_batch: inference.batch_size,
        sampler: Arc::new(llm::samplers::TopPTopK {
            top_k: inference.top_k,
            top_p: inference.top_p,
            temperature: inference.temperature,
            repeat_penalty: inference.repeat_penalty,
            repetition_penalty_last_n: inference.repeat_penalty_last_n_token_count,
            bias_tokens: Default::default(),
        }),
    };

    // Prompt tokens are collected along with the inferred ones so the
    // decoded output contains the full "Q: ...\nA: ..." text that the
    // answer is extracted from.
    let mut decoded = String::new();
    session
        .infer::<std::convert::Infallible>(
            model,
            &mut rng,
            &llm::InferenceRequest {
                prompt: (&prompt).into(),
                parameters: &params,
                play_back_previous_tokens: false,
                maximum_token_count: Some(inference.max_new_tokens),
            },
            &mut Default::default(),
            |t| {
                match t {
                    llm::InferenceResponse::SnapshotToken(t)
                    | llm::InferenceResponse::PromptToken(t)
                    | llm::InferenceResponse::InferredToken(t) => decoded.push_str(&t),
                    llm::InferenceResponse::EotToken => {}
                }

                Ok(llm::InferenceFeedback::Continue)
            },
        )
        .map_err(|e| InferenceError::custom(e.to_string()))?;

    Ok(extract_answer(&decoded).to_string())
}

/// Takes everything after the first answer marker in the decoded output,
/// or the whole output when the marker never appears, trimmed either way.
fn extract_answer(decoded: &str) -> &str {
    match decoded.split_once(constant::ANSWER_MARKER) {
        Some((_, answer)) => answer.trim(),
        None => decoded.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_follows_marker() {
        assert_eq!(extract_answer("Q: What is 2+2?\nA: 4"), "4");
    }

    #[test]
    fn output_without_marker_is_used_whole() {
        assert_eq!(extract_answer("no marker present"), "no marker present");
        assert_eq!(extract_answer("  padded, no marker \n"), "padded, no marker");
    }

    #[test]
    fn only_the_first_marker_splits() {
        assert_eq!(
            extract_answer("Q: repeat after me\nA: first A: second"),
            "first A: second"
        );
    }

    #[test]
    fn empty_output_stays_empty() {
        assert_eq!(extract_answer(""), "");
        assert_eq!(extract_answer("Q: silence\nA:"), "");
    }

    #[test]
    fn errors_become_the_fallback_string() {
        assert_eq!(
            finish(Err(InferenceError::custom("tokenization failed"))),
            constant::fallback::GENERATION_FAILED
        );
        assert_eq!(finish(Ok("4".to_string())), "4");
    }

    #[test]
    fn pool_replies_match_their_requests() {
        let (request_tx, request_rx) = flume::unbounded::<Request>();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let request_rx = request_rx.clone();
                std::thread::spawn(move || {
                    worker_loop(&request_rx, |question| format!("answer to {question}"))
                })
            })
            .collect();

        let replies: Vec<_> = (0..5)
            .map(|i| {
                let (reply_tx, reply_rx) = flume::bounded(1);
                request_tx
                    .send(Request {
                        question: format!("question {i}"),
                        reply_tx,
                    })
                    .unwrap();
                reply_rx
            })
            .collect();

        for (i, reply_rx) in replies.into_iter().enumerate() {
            assert_eq!(reply_rx.recv().unwrap(), format!("answer to question {i}"));
        }

        drop(request_tx);
        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn dropped_requester_does_not_kill_the_worker() {
        let (request_tx, request_rx) = flume::unbounded::<Request>();

        let worker = std::thread::spawn(move || {
            worker_loop(&request_rx, |question| question.to_string())
        });

        let (reply_tx, reply_rx) = flume::bounded(1);
        drop(reply_rx);
        request_tx
            .send(Request {
                question: "abandoned".to_string(),
                reply_tx,
            })
            .unwrap();

        let (reply_tx, reply_rx) = flume::bounded(1);
        request_tx
            .send(Request {
                question: "still alive".to_string(),
                reply_tx,
            })
            .unwrap();
        assert_eq!(reply_rx.recv().unwrap(), "still alive");

        drop(request_tx);
        worker.join().unwrap();
    }
}
