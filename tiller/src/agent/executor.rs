//! The reason-act loop.
//!
//! One `invoke` is logically sequential: resolve state, append the user message,
//! then iterate (`before_invoke` middleware, model call, tool sub-loop with
//! interception, `after_invoke`) until the model answers without tool calls or
//! the iteration bound trips. Checkpoints are saved at approval interrupts and
//! after loop exit. Suspension points (model call, each tool call, checkpoint
//! I/O) are individually guarded by the run deadline and the cancellation token;
//! no critical section spans more than one of them.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::config::AgentConfig;
use crate::agent::interrupt::{Interrupt, ResumeCommand};
use crate::agent::request::Request;
use crate::agent::response::Response;
use crate::error::AgentError;
use crate::llm::{ChatCompletion, ChatModel, ChatOptions, ChatStreamCallback, TokenUsage};
use crate::memory::Checkpointer;
use crate::message::{next_timestamp_ms, Message};
use crate::middleware::{AgentContext, InterceptionResult, MiddlewareChain, RuntimeStatus};
use crate::state::{AgentState, ToolCall, ToolResult};
use crate::stream::StreamEvent;
use crate::tools::ToolInvoker;

/// Event sink for one run; inert when the caller did not ask for streaming.
pub(crate) struct Sink<'a> {
    f: Option<&'a mut (dyn FnMut(StreamEvent) + Send)>,
}

impl<'a> Sink<'a> {
    pub(crate) fn new(f: Option<&'a mut (dyn FnMut(StreamEvent) + Send)>) -> Self {
        Self { f }
    }

    fn active(&self) -> bool {
        self.f.is_some()
    }

    fn emit(&mut self, event: StreamEvent) {
        if let Some(f) = self.f.as_mut() {
            f(event);
        }
    }
}

/// Forwards model stream events into the run's event channel. The channel sender
/// is per call; dropping it (with the model future) ends the forward loop.
struct ChannelCallback {
    tx: mpsc::UnboundedSender<StreamEvent>,
}

impl ChatStreamCallback for ChannelCallback {
    fn on_token(&self, token: &str) {
        let _ = self.tx.send(StreamEvent::Token {
            content: token.to_string(),
        });
    }

    fn on_tool_call(&self, _content_so_far: &str, call: &ToolCall) {
        let _ = self.tx.send(StreamEvent::ToolCall { call: call.clone() });
    }
}

/// Everything one run carries between loop phases.
struct RunFrame<'a> {
    ctx: AgentContext,
    thread_id: Option<String>,
    deadline: tokio::time::Instant,
    start_instant: Instant,
    start_time: i64,
    max_iterations: u32,
    model_calls: u32,
    pending: Vec<ToolCall>,
    all_calls: Vec<ToolCall>,
    usage: Option<TokenUsage>,
    sink: Sink<'a>,
}

enum ToolPhase {
    Completed,
    Stopped,
    Interrupted(Response),
}

enum LoopOutcome {
    Completed,
    Interrupted(Response),
}

/// Owns the collaborators of one agent and drives the loop. Shared by clones of
/// [`Agent`](crate::agent::Agent) behind an `Arc`.
pub(crate) struct Executor {
    pub(crate) model: Arc<dyn ChatModel>,
    pub(crate) invoker: Arc<ToolInvoker>,
    pub(crate) checkpointer: Option<Arc<dyn Checkpointer>>,
    pub(crate) middleware: MiddlewareChain,
    pub(crate) config: AgentConfig,
    pub(crate) cancel: CancellationToken,
}

impl Executor {
    /// Guards one suspension point with the run deadline and the caller's
    /// cancellation token.
    async fn guarded<T, F>(&self, deadline: tokio::time::Instant, fut: F) -> Result<T, AgentError>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(AgentError::Cancelled),
            result = tokio::time::timeout_at(deadline, fut) => {
                result.map_err(|_| AgentError::Timeout(self.config.timeout))
            }
        }
    }

    fn chat_options(&self, request: &Request) -> ChatOptions {
        ChatOptions {
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            stop_sequences: self.config.stop_sequences.clone(),
            system_prompt: request
                .system_prompt
                .clone()
                .or_else(|| self.config.system_prompt.clone()),
            tools: self.invoker.registry().specs(),
        }
    }

    /// Appends one message through the state-update interception path.
    async fn apply_message(
        &self,
        ctx: &mut AgentContext,
        message: Message,
    ) -> Result<(), AgentError> {
        let derived = ctx.take_state().with_message(message);
        let updated = self.middleware.on_state_update(derived, ctx).await?;
        ctx.replace_state(updated);
        Ok(())
    }

    /// Resolves the starting state: explicit request state, then the thread's
    /// latest checkpoint, then a fresh state seeded from the system prompt.
    async fn resolve_initial_state(
        &self,
        request: &mut Request,
        thread_id: &Option<String>,
    ) -> Result<AgentState, AgentError> {
        if let Some(state) = request.state.take() {
            return Ok(state);
        }
        if let (Some(tid), Some(cp)) = (thread_id, &self.checkpointer) {
            if let Some(state) = cp.load_latest(tid).await? {
                tracing::debug!(thread_id = %tid, version = state.version, "resumed from latest checkpoint");
                return Ok(state);
            }
        }
        let prompt = request
            .system_prompt
            .clone()
            .or_else(|| self.config.system_prompt.clone());
        Ok(match prompt {
            Some(p) => AgentState::with_system_prompt(p),
            None => AgentState::new(),
        })
    }

    /// The thread this run persists to: request override, then agent default;
    /// minted when a checkpointer is configured but no thread was named.
    fn resolve_thread_id(&self, request: &Request) -> Option<String> {
        request
            .thread_id
            .clone()
            .or_else(|| self.config.thread_id.clone())
            .or_else(|| {
                self.checkpointer
                    .as_ref()
                    .map(|_| uuid::Uuid::new_v4().to_string())
            })
    }

    fn build_response(
        &self,
        frame: &mut RunFrame<'_>,
        checkpoint_id: Option<String>,
        interrupt: Option<Interrupt>,
    ) -> Response {
        let end_time = next_timestamp_ms();
        let output = if interrupt.is_some() {
            String::new()
        } else {
            frame.ctx.state().last_assistant_reply().to_string()
        };
        Response {
            output,
            messages: frame.ctx.state().messages.clone(),
            state: frame.ctx.state().clone(),
            thread_id: frame.thread_id.clone(),
            checkpoint_id,
            duration_ms: frame.start_instant.elapsed().as_millis() as u64,
            start_time: frame.start_time,
            end_time,
            iterations: frame.model_calls,
            tool_calls: frame.all_calls.clone(),
            usage: frame.usage,
            interrupt,
            error: None,
        }
    }

    /// Provisional response for `after_invoke`, then the hook itself (reverse
    /// order), then the iteration counter.
    async fn finish_iteration(&self, frame: &mut RunFrame<'_>) -> Result<(), AgentError> {
        let provisional = self.build_response(frame, None, None);
        frame.ctx.response = Some(provisional);
        self.middleware.after_invoke(&mut frame.ctx).await?;
        frame.ctx.iteration += 1;
        Ok(())
    }

    async fn save_checkpoint(
        &self,
        frame: &mut RunFrame<'_>,
    ) -> Result<Option<String>, AgentError> {
        let (Some(tid), Some(cp)) = (&frame.thread_id, &self.checkpointer) else {
            return Ok(None);
        };
        let checkpoint_id = self
            .guarded(frame.deadline, cp.save(tid, frame.ctx.state()))
            .await??;
        frame.sink.emit(StreamEvent::Checkpoint {
            checkpoint_id: checkpoint_id.clone(),
            thread_id: tid.clone(),
            message_count: frame.ctx.state().messages.len(),
        });
        Ok(Some(checkpoint_id))
    }

    /// One model call, streamed when the request asked for it and a sink is
    /// attached; the completion is appended to state either way.
    async fn call_model(&self, frame: &mut RunFrame<'_>) -> Result<ChatCompletion, AgentError> {
        let options = self.chat_options(&frame.ctx.request);
        let messages = frame.ctx.state().messages.clone();

        let completion = if frame.sink.active() && frame.ctx.request.stream_enabled {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let callback = Arc::new(ChannelCallback { tx });
            let model = Arc::clone(&self.model);
            let sink = &mut frame.sink;
            let joint = async {
                let (result, _) = tokio::join!(
                    model.chat_stream(&messages, &options, callback),
                    async {
                        while let Some(event) = rx.recv().await {
                            sink.emit(event);
                        }
                    }
                );
                result
            };
            self.guarded(frame.deadline, joint).await??
        } else {
            self.guarded(frame.deadline, self.model.chat(&messages, &options))
                .await??
        };

        if let Some(u) = completion.usage {
            frame.usage = Some(frame.usage.map_or(u, |prev| prev.add(u)));
            frame.sink.emit(StreamEvent::Usage { usage: u });
        }
        self.apply_message(&mut frame.ctx, completion.to_message())
            .await?;
        Ok(completion)
    }

    /// Executes one already-approved (or edited) tool call: invoke, `after_tool_call`,
    /// append the tool message.
    async fn run_approved_call(
        &self,
        frame: &mut RunFrame<'_>,
        call: &ToolCall,
    ) -> Result<(), AgentError> {
        let mut result = self
            .guarded(frame.deadline, self.invoker.invoke(call))
            .await?;
        self.middleware
            .after_tool_call(call, &mut result, &mut frame.ctx)
            .await?;
        frame.sink.emit(StreamEvent::ToolResult {
            result: result.clone(),
        });
        self.apply_message(&mut frame.ctx, Message::tool(&result))
            .await
    }

    /// The tool sub-loop: serialized in the order the model listed the calls.
    async fn process_tools(&self, frame: &mut RunFrame<'_>) -> Result<ToolPhase, AgentError> {
        frame.ctx.status = RuntimeStatus::WaitingForTool;
        let calls = std::mem::take(&mut frame.pending);
        for call in &calls {
            match self
                .middleware
                .before_tool_call(call, &mut frame.ctx)
                .await?
            {
                InterceptionResult::Continue => {
                    if !frame.sink.active() || !frame.ctx.request.stream_enabled {
                        // In stream mode the model callback already announced the call.
                        frame.sink.emit(StreamEvent::ToolCall { call: call.clone() });
                    }
                    self.run_approved_call(frame, call).await?;
                }
                InterceptionResult::Stop(reason) => {
                    tracing::info!(tool = %call.name, reason = %reason, "tool call stopped");
                    let synthetic = ToolResult::error(&call.id, reason);
                    frame.sink.emit(StreamEvent::ToolResult {
                        result: synthetic.clone(),
                    });
                    self.apply_message(&mut frame.ctx, Message::tool(&synthetic))
                        .await?;
                    frame.ctx.status = RuntimeStatus::Stopped;
                    return Ok(ToolPhase::Stopped);
                }
                InterceptionResult::Interrupt(mut interrupt) => {
                    frame.ctx.status = RuntimeStatus::WaitingForApproval;
                    interrupt.thread_id = frame.thread_id.clone();
                    interrupt.checkpoint_id = self.save_checkpoint(frame).await?;
                    tracing::info!(
                        tool = %call.name,
                        checkpoint_id = ?interrupt.checkpoint_id,
                        "execution suspended for approval"
                    );
                    frame.sink.emit(StreamEvent::Interrupt {
                        interrupt: interrupt.clone(),
                    });
                    let checkpoint_id = interrupt.checkpoint_id.clone();
                    let response = self.build_response(frame, checkpoint_id, Some(interrupt));
                    frame.ctx.response = Some(response.clone());
                    return Ok(ToolPhase::Interrupted(response));
                }
            }
        }
        frame.ctx.status = RuntimeStatus::Running;
        Ok(ToolPhase::Completed)
    }

    /// The main loop. Entered with `pending` tool calls on the resume path, empty
    /// otherwise.
    async fn run_loop(&self, frame: &mut RunFrame<'_>) -> Result<LoopOutcome, AgentError> {
        loop {
            if !frame.pending.is_empty() {
                match self.process_tools(frame).await? {
                    ToolPhase::Interrupted(response) => {
                        return Ok(LoopOutcome::Interrupted(response))
                    }
                    ToolPhase::Stopped => {
                        self.finish_iteration(frame).await?;
                        return Ok(LoopOutcome::Completed);
                    }
                    ToolPhase::Completed => {}
                }
                self.finish_iteration(frame).await?;
                if frame.model_calls >= frame.max_iterations {
                    return Ok(LoopOutcome::Completed);
                }
            }

            self.middleware.before_invoke(&mut frame.ctx).await?;
            let completion = self.call_model(frame).await?;
            frame.model_calls += 1;
            frame.all_calls.extend(completion.tool_calls.iter().cloned());

            let terminal =
                completion.tool_calls.is_empty() || frame.model_calls >= frame.max_iterations;
            if terminal {
                if !completion.tool_calls.is_empty() {
                    tracing::warn!(
                        max_iterations = frame.max_iterations,
                        unprocessed = completion.tool_calls.len(),
                        "iteration bound reached with tool calls left unprocessed"
                    );
                }
                self.finish_iteration(frame).await?;
                return Ok(LoopOutcome::Completed);
            }
            frame.pending = completion.tool_calls;
        }
    }

    /// Completion path after loop exit: final state-update pass, checkpoint,
    /// response construction.
    async fn complete(&self, frame: &mut RunFrame<'_>) -> Result<Response, AgentError> {
        let state = frame.ctx.take_state();
        let updated = self.middleware.on_state_update(state, &mut frame.ctx).await?;
        frame.ctx.replace_state(updated);

        let checkpoint_id = self.save_checkpoint(frame).await?;
        if frame.ctx.status != RuntimeStatus::Stopped {
            frame.ctx.status = RuntimeStatus::Idle;
        }
        let response = self.build_response(frame, checkpoint_id, None);
        frame.ctx.response = Some(response.clone());
        frame.sink.emit(StreamEvent::RunEnd {
            output: response.output.clone(),
            duration_ms: response.duration_ms,
        });
        Ok(response)
    }

    fn new_frame<'a>(
        &self,
        request: Request,
        state: AgentState,
        thread_id: Option<String>,
        sink: Sink<'a>,
    ) -> RunFrame<'a> {
        let max_iterations = request
            .max_iterations
            .unwrap_or(self.config.max_iterations)
            .max(1);
        let mut ctx = AgentContext::new(request, state);
        ctx.status = RuntimeStatus::Running;
        RunFrame {
            ctx,
            thread_id,
            deadline: tokio::time::Instant::now() + self.config.timeout,
            start_instant: Instant::now(),
            start_time: next_timestamp_ms(),
            max_iterations,
            model_calls: 0,
            pending: Vec::new(),
            all_calls: Vec::new(),
            usage: None,
            sink,
        }
    }

    /// Entry for `invoke` and `stream`.
    pub(crate) async fn execute(
        &self,
        mut request: Request,
        on_event: Option<&mut (dyn FnMut(StreamEvent) + Send)>,
    ) -> Result<Response, AgentError> {
        let thread_id = self.resolve_thread_id(&request);
        let continuing = request.state.is_some();
        let state = self.resolve_initial_state(&mut request, &thread_id).await?;
        let mut frame = self.new_frame(request, state, thread_id, Sink::new(on_event));
        frame.sink.emit(StreamEvent::RunStart {
            thread_id: frame.thread_id.clone(),
        });

        let result = self.drive(&mut frame, continuing).await;
        self.settle(frame, result).await
    }

    async fn drive(
        &self,
        frame: &mut RunFrame<'_>,
        continuing: bool,
    ) -> Result<Response, AgentError> {
        let input = frame.ctx.request.input.clone();
        // The user message is already in state on resume-style continuations that
        // carry no new input.
        if !input.is_empty() {
            let message = match frame.ctx.request.user_id.clone() {
                Some(user_id) => Message::human_from(input, user_id),
                None => Message::human(input),
            };
            self.apply_message(&mut frame.ctx, message).await?;
        } else if !continuing {
            tracing::debug!("empty input on a fresh run; starting from state as-is");
        }

        match self.run_loop(frame).await? {
            LoopOutcome::Interrupted(response) => Ok(response),
            LoopOutcome::Completed => self.complete(frame).await,
        }
    }

    /// Runs `on_error`/`on_finally` and emits the terminal stream event.
    async fn settle(
        &self,
        mut frame: RunFrame<'_>,
        result: Result<Response, AgentError>,
    ) -> Result<Response, AgentError> {
        match result {
            Ok(response) => {
                self.middleware.on_finally(&mut frame.ctx, None).await;
                Ok(response)
            }
            Err(error) => {
                frame.ctx.status = RuntimeStatus::Error;
                self.middleware.on_error(&error, &mut frame.ctx).await;
                self.middleware.on_finally(&mut frame.ctx, Some(&error)).await;
                frame.sink.emit(StreamEvent::Error {
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Entry for `resume`: load the checkpoint, apply the command to the paused
    /// call, then continue the loop with the remaining queued calls.
    pub(crate) async fn execute_resume(
        &self,
        thread_id: &str,
        checkpoint_id: &str,
        command: ResumeCommand,
        on_event: Option<&mut (dyn FnMut(StreamEvent) + Send)>,
    ) -> Result<Response, AgentError> {
        let checkpointer = self
            .checkpointer
            .as_ref()
            .ok_or_else(|| AgentError::InvalidRequest("resume requires a checkpointer".into()))?;
        let state = checkpointer
            .load(thread_id, checkpoint_id)
            .await?
            .ok_or_else(|| AgentError::CheckpointNotFound(checkpoint_id.to_string()))?;

        // The resume request carries no input: the original user message is
        // already in the loaded state and must not be re-consumed.
        let request = Request::new("").with_thread_id(thread_id);
        let pending = pending_tool_calls(&state);
        let mut frame = self.new_frame(
            request,
            state,
            Some(thread_id.to_string()),
            Sink::new(on_event),
        );
        // Logically a continuation, never iteration 0 of a request.
        frame.ctx.iteration = 1;
        frame.sink.emit(StreamEvent::RunStart {
            thread_id: frame.thread_id.clone(),
        });

        let result = self.drive_resume(&mut frame, pending, command).await;
        self.settle(frame, result).await
    }

    async fn drive_resume(
        &self,
        frame: &mut RunFrame<'_>,
        mut pending: Vec<ToolCall>,
        command: ResumeCommand,
    ) -> Result<Response, AgentError> {
        if pending.is_empty() {
            tracing::warn!("resume checkpoint has no pending tool calls; continuing the loop");
        } else {
            let paused = pending.remove(0);
            match command {
                ResumeCommand::Approve => {
                    tracing::info!(tool = %paused.name, call_id = %paused.id, "resume: approved");
                    self.run_approved_call(frame, &paused).await?;
                }
                ResumeCommand::ApproveEdited { arguments } => {
                    tracing::info!(tool = %paused.name, call_id = %paused.id, "resume: approved with edits");
                    let edited = ToolCall::new(&paused.id, &paused.name, arguments);
                    self.run_approved_call(frame, &edited).await?;
                }
                ResumeCommand::Reject { reason } => {
                    tracing::info!(tool = %paused.name, call_id = %paused.id, reason = %reason, "resume: rejected");
                    let refusal = ToolResult::error(&paused.id, reason);
                    frame.sink.emit(StreamEvent::ToolResult {
                        result: refusal.clone(),
                    });
                    self.apply_message(&mut frame.ctx, Message::tool(&refusal))
                        .await?;
                }
            }
            // Remaining queued calls go through the normal interception path,
            // including approval, which may interrupt again.
            frame.pending = pending;
            if frame.pending.is_empty() {
                self.finish_iteration(frame).await?;
            }
        }

        match self.run_loop(frame).await? {
            LoopOutcome::Interrupted(response) => Ok(response),
            LoopOutcome::Completed => self.complete(frame).await,
        }
    }
}

/// Tool calls of the last assistant message that have no tool message yet, in the
/// model's order. This is how a resumed run recovers its queue: the paused call is
/// the first entry.
fn pending_tool_calls(state: &AgentState) -> Vec<ToolCall> {
    let Some(assistant_index) = state
        .messages
        .iter()
        .rposition(|m| matches!(m, Message::Assistant(_)))
    else {
        return Vec::new();
    };
    let Some(assistant) = state.messages[assistant_index].as_assistant() else {
        return Vec::new();
    };
    let answered: HashSet<&str> = state.messages[assistant_index..]
        .iter()
        .filter_map(Message::as_tool)
        .map(|t| t.tool_call_id.as_str())
        .collect();
    assistant
        .tool_calls
        .iter()
        .filter(|c| !answered.contains(c.id.as_str()))
        .cloned()
        .collect()
}
