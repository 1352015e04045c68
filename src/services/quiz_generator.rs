use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;
use validator::Validate;

use crate::config::Config;
use crate::errors::{GenResult, GenerateError};
use crate::models::domain::{
    GenerationRequest, Question, QuestionStatus, Quiz, ValidationAction,
};
use crate::services::gateway::{ChatGateway, OpenAiGateway};
use crate::services::question_checker::QuestionChecker;
use crate::services::question_dedup::QuestionDeduper;
use crate::services::question_maker::{random_id, QuestionMaker};
use crate::services::question_pool::QuestionPool;
use crate::services::transcript::TranscriptLogger;

const INITIAL_BATCH_SIZE: usize = 5;
const MAX_BATCH_SIZE: usize = 10;
const BATCH_SIZE_STEP: usize = 2;
/// How many failed judgement attempts a single candidate gets before it is
/// discarded. Matches the revision cap so retries cannot outlive revisions.
const MAX_JUDGEMENT_ATTEMPTS: u32 = 3;
const QUIZ_ID_LEN: usize = 12;

#[derive(Clone, Debug)]
pub struct GeneratorOptions {
    pub model: String,
    /// Run deadline, propagated to every gateway call.
    pub run_timeout: Duration,
    /// Directory for per-run transcript files; `None` disables transcripts.
    pub transcript_dir: Option<PathBuf>,
    /// Fixed RNG seed for ids and option shuffling; `None` seeds from entropy.
    pub rng_seed: Option<u64>,
}

impl GeneratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            run_timeout: Duration::from_secs(600),
            transcript_dir: Some(config.transcript_dir.clone()),
            rng_seed: None,
        }
    }
}

/// How a run ended, observable after the stream closes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The target number of questions was emitted.
    Completed,
    /// The caller cancelled or the run deadline expired.
    Cancelled,
    /// A stage exhausted its retry budget before the target was reached.
    Exhausted { reason: String },
}

/// Handle to an in-flight run: receives emitted questions and can cancel.
pub struct QuizStream {
    receiver: mpsc::Receiver<Question>,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
    outcome: Arc<Mutex<Option<StreamOutcome>>>,
    quiz_id: String,
}

impl QuizStream {
    /// Next emitted question, or `None` once the stream has closed.
    pub async fn next(&mut self) -> Option<Question> {
        self.receiver.recv().await
    }

    /// Signals the producer to stop. The channel closes within one
    /// suspension point; buffered items may be lost.
    pub fn cancel(&self) {
        let _ = self.cancel.send(true);
    }

    pub fn quiz_id(&self) -> &str {
        &self.quiz_id
    }

    /// Waits for the producer task and reports how the run ended.
    pub async fn finish(self) -> StreamOutcome {
        if self.handle.await.is_err() {
            return StreamOutcome::Exhausted {
                reason: "pipeline task failed".to_string(),
            };
        }
        self.outcome
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or(StreamOutcome::Exhausted {
                reason: "pipeline ended without reporting an outcome".to_string(),
            })
    }
}

impl futures::Stream for QuizStream {
    type Item = Question;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Question>> {
        self.receiver.poll_recv(cx)
    }
}

/// Drives maker, checker, and deduper over a shared pool and emits accepted,
/// deduplicated, shuffled questions on a bounded channel.
pub struct QuizGenerator {
    gateway: Arc<dyn ChatGateway>,
    options: GeneratorOptions,
}

impl QuizGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            gateway: Arc::new(OpenAiGateway::new(config)),
            options: GeneratorOptions::from_config(config),
        }
    }

    pub fn with_gateway(gateway: Arc<dyn ChatGateway>, options: GeneratorOptions) -> Self {
        Self { gateway, options }
    }

    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Starts production in the background and returns the outbound stream.
    /// Fails only on invalid input or an unopenable transcript file.
    pub fn stream(&self, request: GenerationRequest) -> GenResult<QuizStream> {
        request.validate()?;

        let run_id = Uuid::new_v4().to_string();
        let transcript = match &self.options.transcript_dir {
            Some(dir) => TranscriptLogger::create(dir, &run_id, &request)?,
            None => TranscriptLogger::disabled(),
        };

        let mut rng = match self.options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let quiz_id = random_id(&mut rng, QUIZ_ID_LEN);

        log::info!(
            "Starting quiz generation run {} for topic: {}, target questions: {}",
            run_id,
            request.topic,
            request.num_questions
        );

        let (tx, receiver) = mpsc::channel(request.num_questions);
        let (cancel, cancel_rx) = watch::channel(false);
        let outcome = Arc::new(Mutex::new(None));

        let run = PipelineRun {
            maker: QuestionMaker::new(
                self.gateway.clone(),
                self.options.model.clone(),
                request.clone(),
            ),
            checker: QuestionChecker::new(self.gateway.clone(), self.options.model.clone()),
            deduper: QuestionDeduper::new(self.gateway.clone(), self.options.model.clone()),
            pool: QuestionPool::new(),
            transcript,
            rng,
            target: request.num_questions,
            deadline: Instant::now() + self.options.run_timeout,
        };

        let outcome_slot = outcome.clone();
        let handle = tokio::spawn(async move {
            let end = run.drive(tx, cancel_rx).await;
            log::info!("Quiz generation run finished: {:?}", end);
            if let Ok(mut slot) = outcome_slot.lock() {
                *slot = Some(end);
            }
        });

        Ok(QuizStream {
            receiver,
            cancel,
            handle,
            outcome,
            quiz_id,
        })
    }

    /// Convenience wrapper: drains the stream into a `Quiz`. A run that ends
    /// early returns the partial quiz inside the error.
    pub async fn collect(&self, request: GenerationRequest) -> GenResult<Quiz> {
        let topic = request.topic.clone();
        let mut stream = self.stream(request)?;

        let mut questions = Vec::new();
        while let Some(question) = stream.next().await {
            questions.push(question);
        }

        let quiz_id = stream.quiz_id().to_string();
        let outcome = stream.finish().await;

        let total_questions = questions.len();
        let quiz = Quiz {
            id: quiz_id,
            topic,
            questions,
            created_at: Utc::now(),
            total_questions,
        };

        match outcome {
            StreamOutcome::Completed => Ok(quiz),
            StreamOutcome::Cancelled => Err(GenerateError::Cancelled {
                partial: Box::new(quiz),
            }),
            StreamOutcome::Exhausted { reason } => Err(GenerateError::Exhausted {
                partial: Box::new(quiz),
                reason,
            }),
        }
    }
}

struct PipelineRun {
    maker: QuestionMaker,
    checker: QuestionChecker,
    deduper: QuestionDeduper,
    pool: QuestionPool,
    transcript: TranscriptLogger,
    rng: StdRng,
    target: usize,
    deadline: Instant,
}

impl PipelineRun {
    async fn drive(
        mut self,
        tx: mpsc::Sender<Question>,
        mut cancel: watch::Receiver<bool>,
    ) -> StreamOutcome {
        let mut emitted = 0usize;
        let mut batch_size = INITIAL_BATCH_SIZE;
        let mut emitted_at_last_refill: Option<usize> = None;
        let mut judgement_failures: HashMap<String, u32> = HashMap::new();
        let mut dedup_retried: HashSet<String> = HashSet::new();

        while emitted < self.target {
            if *cancel.borrow() {
                return StreamOutcome::Cancelled;
            }

            if self.pool.is_empty() {
                if let Some(previous) = emitted_at_last_refill {
                    if emitted == previous && batch_size < MAX_BATCH_SIZE {
                        batch_size = (batch_size + BATCH_SIZE_STEP).min(MAX_BATCH_SIZE);
                        log::info!(
                            "No progress since last refill, increasing batch size to {}",
                            batch_size
                        );
                    }
                }
                emitted_at_last_refill = Some(emitted);

                let batch = tokio::select! {
                    _ = cancel.changed() => return StreamOutcome::Cancelled,
                    result = self.maker.next_batch(
                        batch_size,
                        &mut self.rng,
                        &self.transcript,
                        self.deadline,
                    ) => result,
                };

                let batch = match batch {
                    Ok(batch) if !batch.is_empty() => batch,
                    first_attempt => {
                        if let Err(e) = &first_attempt {
                            log::warn!("Question maker failed, retrying once: {}", e);
                        } else {
                            log::warn!("Question maker returned an empty batch, retrying once");
                        }

                        let retry = tokio::select! {
                            _ = cancel.changed() => return StreamOutcome::Cancelled,
                            result = self.maker.next_batch(
                                batch_size,
                                &mut self.rng,
                                &self.transcript,
                                self.deadline,
                            ) => result,
                        };

                        match retry {
                            Ok(batch) if !batch.is_empty() => batch,
                            Ok(_) => {
                                return self.end_early(
                                    "question maker produced no questions in a pool cycle",
                                )
                            }
                            Err(e) => {
                                return self
                                    .end_early(&format!("question maker failed twice: {}", e))
                            }
                        }
                    }
                };

                log::info!("Adding {} questions to pool", batch.len());
                for question in batch {
                    self.pool.add(question);
                }
            }

            while emitted < self.target {
                if *cancel.borrow() {
                    return StreamOutcome::Cancelled;
                }

                let Some(mut question) = self.pool.get() else {
                    break;
                };

                let validation = tokio::select! {
                    _ = cancel.changed() => return StreamOutcome::Cancelled,
                    result = self.checker.check(&question, &self.transcript, self.deadline) => result,
                };

                let validation = match validation {
                    Ok(validation) => validation,
                    Err(e) => {
                        log::warn!("Error checking question {}: {}", question.id, e);
                        let failures = judgement_failures.entry(question.id.clone()).or_insert(0);
                        *failures += 1;
                        if *failures >= MAX_JUDGEMENT_ATTEMPTS {
                            self.transcript.log_question_result(
                                &question.id,
                                "reject",
                                "judgement retry budget exhausted",
                            );
                        } else {
                            self.pool.add(question);
                        }
                        continue;
                    }
                };

                match validation.action {
                    ValidationAction::Reject => {
                        log::debug!("Question {} rejected: {}", question.id, validation.reason);
                        continue;
                    }
                    ValidationAction::Revise => {
                        if let Some(revised) = validation.revised_question {
                            self.pool.add(revised);
                        }
                        continue;
                    }
                    ValidationAction::Accept => {}
                }

                question.status = QuestionStatus::Accepted;

                let dedup = tokio::select! {
                    _ = cancel.changed() => return StreamOutcome::Cancelled,
                    result = self.deduper.check_duplicate(&question, &self.transcript, self.deadline) => result,
                };

                let dedup = match dedup {
                    Ok(dedup) => dedup,
                    Err(e) => {
                        log::warn!("Error deduplicating question {}: {}", question.id, e);
                        if dedup_retried.insert(question.id.clone()) {
                            self.pool.add(question);
                            continue;
                        }
                        return self.end_early(&format!(
                            "duplicate check failed twice for question {}: {}",
                            question.id, e
                        ));
                    }
                };

                if dedup.is_duplicate {
                    log::debug!(
                        "Question {} discarded as duplicate of {}",
                        question.id,
                        dedup.duplicate_id.as_deref().unwrap_or("unknown")
                    );
                    continue;
                }

                shuffle_answers(&mut question, &mut self.rng);

                let send = tokio::select! {
                    _ = cancel.changed() => return StreamOutcome::Cancelled,
                    result = tx.send(question) => result,
                };
                if send.is_err() {
                    // Receiver dropped: the consumer walked away.
                    return StreamOutcome::Cancelled;
                }
                emitted += 1;
            }
        }

        self.transcript.log_run_complete();
        StreamOutcome::Completed
    }

    fn end_early(&self, reason: &str) -> StreamOutcome {
        self.transcript.log_run_complete();
        if Instant::now() >= self.deadline {
            StreamOutcome::Cancelled
        } else {
            StreamOutcome::Exhausted {
                reason: reason.to_string(),
            }
        }
    }
}

/// Reorders the options by a uniformly random permutation and re-points the
/// correct index, so the correct option is not positionally biased.
fn shuffle_answers<R: Rng>(question: &mut Question, rng: &mut R) {
    if !question.is_well_formed() {
        log::warn!(
            "Skipping option shuffle for malformed question {}",
            question.id
        );
        return;
    }

    let mut permutation: Vec<usize> = (0..question.options.len()).collect();
    permutation.shuffle(rng);

    let mut options = vec![String::new(); question.options.len()];
    for (new_index, &old_index) in permutation.iter().enumerate() {
        options[new_index] = std::mem::take(&mut question.options[old_index]);
    }

    question.correct_answer = permutation
        .iter()
        .position(|&old_index| old_index == question.correct_answer)
        .unwrap_or(question.correct_answer);
    question.options = options;
}
