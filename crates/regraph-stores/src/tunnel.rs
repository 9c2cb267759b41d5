use regraph_core::{Tunnel, TunnelError, TunnelService};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const STARTUP_WAIT: Duration = Duration::from_millis(750);

/// Opens port forwards by spawning `ssh -N -L` through a jumpbox.
pub struct SshTunnelService {
    jumpbox: String,
}

impl SshTunnelService {
    pub fn new(jumpbox: impl Into<String>) -> Self {
        Self {
            jumpbox: jumpbox.into(),
        }
    }
}

impl TunnelService for SshTunnelService {
    fn open(
        &self,
        remote_host: &str,
        remote_port: u16,
        local_port: u16,
    ) -> Result<Box<dyn Tunnel>, TunnelError> {
        let forward = format!("{local_port}:{remote_host}:{remote_port}");
        let error = |reason: String| TunnelError {
            host: remote_host.to_string(),
            port: remote_port,
            reason,
        };

        let mut child = Command::new("ssh")
            .args([
                "-N",
                "-o",
                "ExitOnForwardFailure=yes",
                "-o",
                "BatchMode=yes",
                "-L",
                &forward,
                &self.jumpbox,
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| error(err.to_string()))?;

        // The forward comes up asynchronously; catch an immediate exit
        // (unreachable jumpbox, refused forward) before handing it out.
        thread::sleep(STARTUP_WAIT);
        match child.try_wait() {
            Ok(Some(status)) => {
                return Err(error(format!("ssh exited during startup with {status}")))
            }
            Ok(None) => {}
            Err(err) => return Err(error(err.to_string())),
        }

        debug!(%forward, jumpbox = %self.jumpbox, "tunnel open");
        Ok(Box::new(SshTunnel { child, local_port }))
    }
}

/// One open forward; the ssh process is killed when the value is dropped.
pub struct SshTunnel {
    child: Child,
    local_port: u16,
}

impl Tunnel for SshTunnel {
    fn host(&self) -> String {
        "127.0.0.1".to_string()
    }

    fn port(&self) -> u16 {
        self.local_port
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        if let Err(err) = self.child.kill() {
            warn!(port = self.local_port, "failed to stop tunnel process: {err}");
        }
        if let Err(err) = self.child.wait() {
            warn!(port = self.local_port, "failed to reap tunnel process: {err}");
        }
    }
}
