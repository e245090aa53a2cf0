// Copyright (c) The pytether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debug-attach channel allocation and the attach handshake.
//!
//! A debug run hands each test process a rendezvous: a free TCP port and a
//! shared secret, passed on the launcher command line. The debugger side of
//! the rendezvous is driven through the host's
//! [`DebugHost`](crate::host::DebugHost) implementation.

use crate::{
    cancel::CancelHandle,
    child::TestChild,
    errors::{DebugHostError, PortAllocError},
    host::DebugHost,
    ports::{ActivePorts, DYNAMIC_PORT_MAX, DYNAMIC_PORT_MIN, scan_free_port},
};
use debug_ignore::DebugIgnore;
use rand::RngExt;
use std::time::Duration;

/// How long to wait between looks at a process that is starting up or not
/// yet ready for its debugger.
pub(crate) const ATTACH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// The length of the shared secret before base64 encoding.
const SECRET_LEN: usize = 24;

/// The rendezvous for one debug launch: a TCP port for the debug adapter
/// and a secret the debugger must present.
///
/// The secret is raw random bytes, none of them zero, carried base64
/// encoded so it survives argv. It is redacted from `Debug` output.
#[derive(Debug)]
pub struct DebugChannel {
    secret: DebugIgnore<String>,
    port: u16,
}

impl DebugChannel {
    /// Allocates a channel against the current state of the machine.
    ///
    /// The port is picked from a snapshot of bound ports and is not
    /// reserved, so another process can grab it before the debug adapter
    /// binds it. The attach handshake surfaces that collision.
    pub fn allocate() -> Result<Self, PortAllocError> {
        let active = ActivePorts::snapshot().map_err(PortAllocError::Snapshot)?;
        let start = rand::rng().random_range(DYNAMIC_PORT_MIN..=DYNAMIC_PORT_MAX);
        Self::allocate_in(&active, start)
    }

    fn allocate_in(active: &ActivePorts, start: u16) -> Result<Self, PortAllocError> {
        let port = scan_free_port(start, active).ok_or(PortAllocError::NoFreePort)?;
        Ok(Self {
            secret: DebugIgnore(generate_secret()),
            port,
        })
    }

    /// The base64-encoded secret.
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// The allocated port.
    pub fn port(&self) -> u16 {
        self.port
    }

    #[cfg(test)]
    pub(crate) fn fake(secret: &str, port: u16) -> Self {
        Self {
            secret: DebugIgnore(secret.to_owned()),
            port,
        }
    }
}

fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..SECRET_LEN)
        .map(|_| rng.random_range(1..=u8::MAX))
        .collect();
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, &bytes)
}

/// How the attach handshake for one test ended.
pub(crate) enum AttachFlow {
    /// The debugger is attached; the test runs to completion under it.
    Attached,
    /// The process exited before the first attach attempt.
    EarlyExit,
    /// The process exited somewhere in the retry loop.
    ExitedWhileAttaching,
    /// The host reported a transport failure; the process has been killed.
    TransportFailed(DebugHostError),
    /// The batch was cancelled; the process has been killed.
    Cancelled,
}

enum BriefWait {
    Exited,
    StillRunning,
    Cancelled,
}

/// Watches the child for one poll interval, folding in output as it
/// arrives.
async fn wait_briefly(child: &mut TestChild, cancel: &CancelHandle) -> BriefWait {
    let mut sleep = std::pin::pin!(tokio::time::sleep(ATTACH_POLL_INTERVAL));
    loop {
        tokio::select! {
            () = child.output.fill_buf(), if !child.output.is_done() => {}
            _ = child.proc.wait() => break BriefWait::Exited,
            () = cancel.cancelled() => break BriefWait::Cancelled,
            () = &mut sleep => break BriefWait::StillRunning,
        }
    }
}

/// Drives the attach handshake until the debugger is attached or the
/// attempt is abandoned.
///
/// The first poll interval is a pure grace period with no attach attempt:
/// a process that dies on startup (bad launcher path, import failure)
/// should be reported as a plain early exit, not as an attach failure.
pub(crate) async fn tether_child(
    host: &mut dyn DebugHost,
    child: &mut TestChild,
    transport_id: &str,
    channel: &DebugChannel,
    cancel: &CancelHandle,
) -> AttachFlow {
    match wait_briefly(child, cancel).await {
        BriefWait::Exited => return AttachFlow::EarlyExit,
        BriefWait::Cancelled => {
            child.terminate().await;
            return AttachFlow::Cancelled;
        }
        BriefWait::StillRunning => {}
    }

    loop {
        let Some(pid) = child.proc.id() else {
            return AttachFlow::ExitedWhileAttaching;
        };
        match host.attach(pid, transport_id, channel.secret(), channel.port()) {
            Ok(true) => return AttachFlow::Attached,
            Ok(false) => match wait_briefly(child, cancel).await {
                BriefWait::Exited => return AttachFlow::ExitedWhileAttaching,
                BriefWait::Cancelled => {
                    child.terminate().await;
                    return AttachFlow::Cancelled;
                }
                BriefWait::StillRunning => {}
            },
            Err(error) => {
                child.terminate().await;
                return AttachFlow::TransportFailed(error);
            }
        }
    }
}
