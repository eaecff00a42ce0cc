//! Loop executed inside a background context.

use crate::compute::{self, ComputeLoader, ComputeModule};
use crate::worker::host::WorkerBody;
use crate::worker::protocol::{WorkerReply, WorkerRequest};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Answer requests until the coordinator hangs up.
///
/// Blocks the calling thread; run it inside a background context, never on an async task.
pub fn worker_loop(
    mut requests: UnboundedReceiver<WorkerRequest>,
    replies: UnboundedSender<WorkerReply>,
    loader: Arc<dyn ComputeLoader>,
) {
    let mut state = WorkerState::new(loader);

    while let Some(request) = requests.blocking_recv() {
        let reply = state.handle_request(request);
        if replies.send(reply).is_err() {
            break;
        }
    }
    log::debug!("worker loop exiting");
}

/// Body for [`BackgroundHost::spawn`](crate::worker::BackgroundHost::spawn) that runs
/// [`worker_loop`] with the given loader.
pub fn module_worker_body(loader: Arc<dyn ComputeLoader>) -> WorkerBody {
    Box::new(move |requests, replies| worker_loop(requests, replies, loader))
}

struct WorkerState {
    loader: Arc<dyn ComputeLoader>,
    module: Option<Box<dyn ComputeModule>>,
}

impl WorkerState {
    fn new(loader: Arc<dyn ComputeLoader>) -> Self {
        Self {
            loader,
            module: None,
        }
    }

    fn handle_request(&mut self, request: WorkerRequest) -> WorkerReply {
        match request {
            WorkerRequest::Init => match compute::load_and_init(self.loader.as_ref()) {
                Ok(module) => {
                    self.module = Some(module);
                    WorkerReply::initialized()
                }
                Err(e) => {
                    log::error!("worker import failed: {}", e);
                    WorkerReply::import_failure(e.to_string())
                }
            },
            WorkerRequest::Render => {
                let Some(module) = self.module.as_mut() else {
                    return WorkerReply::render_failure("render requested before init");
                };
                match compute::guarded_render(module.as_mut()) {
                    Ok(frame) => WorkerReply::rendered(frame),
                    Err(e) => {
                        log::error!("worker render failed: {}", e);
                        WorkerReply::render_failure(e.to_string())
                    }
                }
            }
        }
    }
}
