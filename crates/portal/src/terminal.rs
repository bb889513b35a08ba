use std::io::{self, BufRead, IsTerminal};

use portal_gateway::{Acknowledge, Alert, Notifier};
use tokio::runtime::{Handle, RuntimeFlavor};

/// Shows alerts on stderr and, when a person is watching, waits for them to be acknowledged.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn alert(&self, alert: Alert) {
        let Alert {
            message,
            on_acknowledge,
            ..
        } = alert;
        eprintln!("{message}");
        if on_acknowledge == Acknowledge::Reload {
            eprintln!("The session has ended, sign in again with `portal login`.");
        }
        if io::stdin().is_terminal() && io::stderr().is_terminal() {
            eprintln!("Press Enter to continue");
            // Acknowledgement only; nothing to do if stdin is gone.
            let _ = wait_for_enter(&mut io::stdin().lock());
        }
    }
}

/// Read a line without starving the runtime's other tasks, the Ctrl-C watcher among them.
fn wait_for_enter(input: &mut impl BufRead) -> io::Result<usize> {
    let mut buf = String::new();
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| input.read_line(&mut buf))
        }
        _ => input.read_line(&mut buf),
    }
}
