use std::io;
use std::net::TcpListener;
use std::thread::{self, Scope, ScopedJoinHandle};
use tracing::info;

use crate::async_impl::{watch_interrupt, AdminServer};
use crate::ipc::Shutdown;

/// Spawns the `interface` thread: a current-thread tokio runtime serving the
/// administrative protocol on `listener` until shutdown.
pub fn spawn_interface_thread<'scope, 'env>(
    scope: &'scope Scope<'scope, 'env>,
    server: AdminServer,
    listener: TcpListener,
    shutdown: Shutdown,
) -> io::Result<ScopedJoinHandle<'scope, io::Result<()>>> {
    thread::Builder::new()
        .name("interface".to_string())
        .spawn_scoped(scope, move || {
            let _stop = shutdown.on_exit();
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;

            runtime.block_on(async {
                tokio::spawn(watch_interrupt(shutdown.clone()));
                server.serve(listener, shutdown).await
            })?;

            info!("interface thread exiting");
            Ok(())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{PidController, SharedController};
    use crate::ipc::{CommandChannel, TelemetryBuffer};
    use crate::metrics::TimingMetrics;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpStream;

    #[test]
    fn serves_requests_until_shutdown() {
        let controller = SharedController::new(PidController::default());
        let server = AdminServer::new(
            controller.clone(),
            CommandChannel::new(4),
            TelemetryBuffer::new(),
            TimingMetrics::new().unwrap(),
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();

        let result = thread::scope(|s| {
            let handle = spawn_interface_thread(s, server, listener, shutdown.clone()).unwrap();

            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(b"{\"cmd\":\"retune\",\"kp\":4.0,\"ki\":0.0,\"kd\":0.0}\n")
                .unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line.trim(), r#"{"type":"accepted"}"#);

            shutdown.trigger();
            handle.join().unwrap()
        });

        assert!(result.is_ok());
        assert_eq!(controller.snapshot().gains.kp, 4.0);
    }
}
