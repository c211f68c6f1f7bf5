use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::protocol::{parse_request, Request, Response};
use crate::controller::SharedController;
use crate::ipc::{CommandChannel, ModelCommand, Shutdown, TelemetryBuffer};
use crate::metrics::TimingMetrics;

/// Longest request line accepted, excluding the newline. Longer lines are
/// answered with an error and the connection is closed.
pub const MAX_LINE_BYTES: usize = 4096;

/// Applies administrative requests to the shared controller and forwards
/// model commands to the control thread.
#[derive(Clone)]
pub struct AdminServer {
    controller: SharedController,
    commands: CommandChannel,
    telemetry: TelemetryBuffer,
    metrics: TimingMetrics,
}

impl AdminServer {
    pub fn new(
        controller: SharedController,
        commands: CommandChannel,
        telemetry: TelemetryBuffer,
        metrics: TimingMetrics,
    ) -> Self {
        Self {
            controller,
            commands,
            telemetry,
            metrics,
        }
    }

    /// Handles one request. Bounded: takes the controller lock at most once
    /// and never waits on the control thread.
    pub fn handle(&self, request: Request) -> Response {
        let response = match request {
            Request::Retune(gains) => match self.controller.retune(gains) {
                Ok(()) => {
                    info!(kp = gains.kp, ki = gains.ki, kd = gains.kd, "gains updated");
                    Response::Accepted
                }
                Err(err) => Response::error(err.to_string()),
            },
            Request::Reset => {
                self.controller.reset();
                info!("controller history reset");
                Response::Accepted
            }
            Request::Clamp { max, min } => match self.controller.configure_clamp(max, min) {
                Ok(()) => {
                    info!(min, max, "output clamp updated");
                    Response::Accepted
                }
                Err(err) => Response::error(err.to_string()),
            },
            Request::Query => Response::Controller(self.controller.snapshot()),
            Request::State => Response::State(self.telemetry.get()),
            Request::Status => {
                let telemetry = self.telemetry.get();
                Response::Status {
                    paused: telemetry.paused,
                    started: telemetry.started,
                }
            }
            Request::StartStop => self.forward(ModelCommand::TogglePause),
            Request::ResetModel => self.forward(ModelCommand::Reset),
            Request::Params(params) => {
                let sample_time = self.controller.snapshot().sample_time;
                match params.validate(sample_time) {
                    Ok(()) => self.forward(ModelCommand::SetParams(params)),
                    Err(err) => Response::error(err.to_string()),
                }
            }
        };

        if let Response::Error { message } = &response {
            warn!(%message, "request rejected");
        }
        self.metrics.record_admin_request(!response.is_error());
        response
    }

    pub fn handle_line(&self, line: &str) -> Response {
        match parse_request(line) {
            Ok(request) => self.handle(request),
            Err(err) => {
                self.metrics.record_admin_request(false);
                warn!(%err, "malformed request");
                Response::error(format!("malformed request: {err}"))
            }
        }
    }

    fn forward(&self, command: ModelCommand) -> Response {
        match self.commands.submit(command) {
            Ok(()) => Response::Accepted,
            Err(err) if err.is_full() => Response::error("control loop busy, retry"),
            Err(_) => Response::error("control loop stopped"),
        }
    }

    /// Accepts connections until shutdown. Connection tasks are dropped with
    /// the runtime once this returns.
    pub async fn serve(self, listener: std::net::TcpListener, shutdown: Shutdown) -> io::Result<()> {
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        info!(addr = %listener.local_addr()?, "admin interface listening");

        loop {
            tokio::select! {
                _ = shutdown.wait() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "client connected");
                        let server = self.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = server.serve_connection(stream, shutdown).await {
                                debug!(%peer, %err, "connection closed with error");
                            }
                        });
                    }
                    Err(err) => warn!(%err, "accept failed"),
                },
            }
        }

        info!("admin interface stopped");
        Ok(())
    }

    async fn serve_connection(self, stream: TcpStream, shutdown: Shutdown) -> io::Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64 + 1);
            let read = tokio::select! {
                _ = shutdown.wait() => break,
                read = limited.read_line(&mut line) => read?,
            };
            if read == 0 {
                break;
            }

            if !line.ends_with('\n') && line.len() > MAX_LINE_BYTES {
                self.metrics.record_admin_request(false);
                warn!(
                    limit = MAX_LINE_BYTES,
                    "request line too long, closing connection"
                );
                let response =
                    Response::error(format!("request line exceeds {MAX_LINE_BYTES} bytes"));
                Self::write_response(&mut writer, &response).await?;
                break;
            }
            if line.trim().is_empty() {
                continue;
            }

            let response = self.handle_line(line.trim_end());
            Self::write_response(&mut writer, &response).await?;
        }
        Ok(())
    }

    async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> io::Result<()> {
        let mut payload = serde_json::to_vec(response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await
    }
}

/// Triggers shutdown on Ctrl-C.
pub async fn watch_interrupt(shutdown: Shutdown) {
    tokio::select! {
        _ = shutdown.wait() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("interrupt received, shutting down");
                shutdown.trigger();
            }
            Err(err) => warn!(%err, "cannot listen for interrupt"),
        },
    }
}
