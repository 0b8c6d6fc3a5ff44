use crate::app::{AppCommand, LoopEvent, Mutation};
use crate::docker::{ResourceService, ServiceSet};
use crate::model::ResourceKind;
use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};
use tracing::{debug, warn};

/// One in-flight task per key. Spawning under a busy key aborts the older task.
#[derive(Debug, Default)]
pub struct RequestTracker {
    tasks: HashMap<String, JoinHandle<()>>,
}

impl RequestTracker {
    pub fn spawn<F>(&mut self, key: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        self.tasks.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = self.tasks.insert(key.clone(), tokio::spawn(future))
            && !previous.is_finished()
        {
            debug!(request = %key, "superseding in-flight request");
            previous.abort();
        }
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.tasks
            .get(key)
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn abort_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }
}

/// Single-slot search timer: scheduling again cancels the pending one.
#[derive(Debug, Default)]
pub struct SearchDebounce {
    pending: Option<JoinHandle<()>>,
}

impl SearchDebounce {
    pub fn schedule(
        &mut self,
        delay: Duration,
        generation: u64,
        events: mpsc::UnboundedSender<LoopEvent>,
    ) {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(LoopEvent::SearchDue(generation));
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub backend_timeout: Duration,
    pub settle_delay: Duration,
    pub search_debounce: Duration,
}

/// Runs backend work off the event loop and reports back through `LoopEvent`s.
pub struct Backend {
    services: ServiceSet,
    events: mpsc::UnboundedSender<LoopEvent>,
    tracker: RequestTracker,
    debounce: SearchDebounce,
    timings: Timings,
}

impl Backend {
    pub fn new(
        services: ServiceSet,
        events: mpsc::UnboundedSender<LoopEvent>,
        timings: Timings,
    ) -> Self {
        Self {
            services,
            events,
            tracker: RequestTracker::default(),
            debounce: SearchDebounce::default(),
            timings,
        }
    }

    pub fn set_timings(&mut self, timings: Timings) {
        self.timings = timings;
    }

    pub fn is_listing(&self, kind: ResourceKind) -> bool {
        self.tracker.is_busy(&format!("list:{}", kind.name()))
    }

    pub fn shutdown(&mut self) {
        self.debounce.cancel();
        self.tracker.abort_all();
    }

    /// Spawns the task for `command`. `ReloadConfig` and `None` are handled by the caller.
    pub fn dispatch(&mut self, command: AppCommand) {
        let limit = self.timings.backend_timeout;
        let events = self.events.clone();
        match command {
            AppCommand::None | AppCommand::ReloadConfig => {}
            AppCommand::List(kind) => {
                let service = self.services.get(kind);
                self.tracker.spawn(format!("list:{}", kind.name()), async move {
                    let result = bounded(limit, "list", async move { service?.list().await }).await;
                    let _ = events.send(LoopEvent::Listed { kind, result });
                });
            }
            AppCommand::Inspect(item) => {
                let service = self.services.get(item.kind);
                self.tracker.spawn("inspect", async move {
                    let id = item.id.clone();
                    let result =
                        bounded(limit, "inspect", async move { service?.inspect(&id).await }).await;
                    let _ = events.send(LoopEvent::Inspected { item, result });
                });
            }
            AppCommand::Mutate { item, mutation } => {
                let service = self.services.get(item.kind);
                let settle = self.timings.settle_delay;
                let key = format!("mutate:{}", item.id);
                self.tracker.spawn(key, async move {
                    let id = item.id.clone();
                    let change = mutation.clone();
                    let result = bounded(limit, "mutation", async move {
                        apply_mutation(service?, &id, &change).await
                    })
                    .await;
                    if result.is_ok() {
                        sleep(settle).await;
                    }
                    let _ = events.send(LoopEvent::Mutated {
                        item,
                        mutation,
                        result,
                    });
                });
            }
            AppCommand::FetchLogs { item, tail } => {
                let service = self.services.get(item.kind);
                self.tracker.spawn("logs", async move {
                    let id = item.id.clone();
                    let result =
                        bounded(limit, "logs", async move { service?.logs(&id, tail).await }).await;
                    let _ = events.send(LoopEvent::LogsFetched { item, result });
                });
            }
            AppCommand::SaveLogs { file_name, content } => {
                self.tracker.spawn("save-logs", async move {
                    let result = tokio::fs::write(&file_name, content)
                        .await
                        .map(|()| file_name.clone())
                        .map_err(|error| format!("failed to write {file_name}: {error}"));
                    let _ = events.send(LoopEvent::LogsSaved(result));
                });
            }
            AppCommand::Exec {
                target,
                args,
                origin,
            } => {
                let service = self.services.get(target.kind);
                self.tracker.spawn("exec", async move {
                    let id = target.id.clone();
                    let result =
                        bounded(limit, "exec", async move { service?.exec(&id, &args).await })
                            .await;
                    let _ = events.send(LoopEvent::ExecFinished {
                        target,
                        origin,
                        result,
                    });
                });
            }
            AppCommand::ScheduleSearch { generation } => {
                self.debounce
                    .schedule(self.timings.search_debounce, generation, events);
            }
        }
    }

    pub fn request_engine_info(&mut self) {
        if self.tracker.is_busy("engine") {
            return;
        }
        let services = self.services.clone();
        let events = self.events.clone();
        let limit = self.timings.backend_timeout;
        self.tracker.spawn("engine", async move {
            let result = bounded(limit, "engine info", async move {
                services.engine_info().await
            })
            .await;
            let _ = events.send(LoopEvent::Engine(result));
        });
    }
}

async fn apply_mutation(
    service: Arc<dyn ResourceService>,
    id: &str,
    mutation: &Mutation,
) -> Result<()> {
    match mutation {
        Mutation::Remove => service.remove(id, true).await,
        Mutation::Start => service.start(id).await,
        Mutation::Stop => service.stop(id).await,
        Mutation::Restart => service.restart(id).await,
        Mutation::Scale(replicas) => service.scale(id, *replicas).await,
        Mutation::Availability(availability) => {
            service.update_availability(id, availability).await
        }
    }
}

/// Applies the backend timeout and flattens the error for the event channel.
async fn bounded<T, F>(limit: Duration, operation: &str, future: F) -> Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    debug!(operation, "backend call started");
    match timeout(limit, future).await {
        Ok(Ok(value)) => {
            debug!(operation, "backend call finished");
            Ok(value)
        }
        Ok(Err(error)) => {
            debug!(operation, error = %format!("{error:#}"), "backend call failed");
            Err(compact_error(&error))
        }
        Err(_) => {
            warn!(operation, timeout_secs = limit.as_secs(), "backend call timed out");
            Err(compact_error(&anyhow!(
                "{operation} timed out after {}s",
                limit.as_secs()
            )))
        }
    }
}

pub fn compact_error(error: &anyhow::Error) -> String {
    let mut out = Vec::new();
    for (index, cause) in error.chain().enumerate() {
        if index == 0 {
            out.push(cause.to_string());
        } else if index <= 2 {
            out.push(format!("caused by: {cause}"));
        } else {
            break;
        }
    }

    out.join("\n")
}
