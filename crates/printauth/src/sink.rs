//! Terminal presentation sink.
//!
//! Prompts go to stderr. Answers come from a single line source: a dedicated
//! thread reads stdin and forwards each line over a channel. The credential
//! prompt takes the next line from that channel; while the material modal is
//! open a choice reader task owns it instead, and it is aborted when the
//! modal closes so the next prompt sees every line typed after that point.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use printauth_core::{MaterialChoice, MaterialOption, Notification, PresentationSink};
use printauth_handshake::render::{material_list_text, welcome_line};
use printauth_handshake::HandshakeInput;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

// ---------------------------------------------------------------------------
// LineSource
// ---------------------------------------------------------------------------

/// Lines typed by the user, with room to hand one back unconsumed.
struct LineSource {
    rx: mpsc::UnboundedReceiver<String>,
    held: Option<String>,
}

impl LineSource {
    async fn next(&mut self) -> Option<String> {
        match self.held.take() {
            Some(line) => Some(line),
            None => self.rx.recv().await,
        }
    }

    fn hold(&mut self, line: String) {
        self.held = Some(line);
    }
}

/// Read stdin on its own thread. A blocked read never holds up the runtime.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("printauth-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read stdin");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "failed to start stdin reader; prompts will see end of input");
    }
    rx
}

// ---------------------------------------------------------------------------
// TerminalSink
// ---------------------------------------------------------------------------

pub struct TerminalSink {
    lines: Arc<Mutex<LineSource>>,
    inputs: mpsc::Sender<HandshakeInput>,
    modal_open: Arc<AtomicBool>,
    accepting: Arc<AtomicBool>,
    choice_reader: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TerminalSink {
    /// Answers are read from stdin; material choices are sent to `inputs`.
    pub fn new(inputs: mpsc::Sender<HandshakeInput>) -> Self {
        Self::with_lines(spawn_stdin_reader(), inputs)
    }

    /// Answers are taken from `lines` in the order they arrive.
    pub fn with_lines(
        lines: mpsc::UnboundedReceiver<String>,
        inputs: mpsc::Sender<HandshakeInput>,
    ) -> Self {
        Self {
            lines: Arc::new(Mutex::new(LineSource { rx: lines, held: None })),
            inputs,
            modal_open: Arc::new(AtomicBool::new(false)),
            accepting: Arc::new(AtomicBool::new(false)),
            choice_reader: std::sync::Mutex::new(None),
        }
    }

    fn replace_choice_reader(&self, reader: Option<JoinHandle<()>>) {
        let mut slot = self
            .choice_reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(previous) = std::mem::replace(&mut *slot, reader) {
            previous.abort();
        }
    }

    fn spawn_choice_reader(&self) -> JoinHandle<()> {
        let lines = Arc::clone(&self.lines);
        let inputs = self.inputs.clone();
        let modal_open = Arc::clone(&self.modal_open);
        let accepting = Arc::clone(&self.accepting);

        tokio::spawn(async move {
            let mut lines = lines.lock().await;
            while let Some(line) = lines.next().await {
                if !modal_open.load(Ordering::SeqCst) {
                    lines.hold(line);
                    break;
                }
                if !accepting.load(Ordering::SeqCst) {
                    eprintln!("Please wait, your previous choice is being confirmed.");
                    continue;
                }
                match line.parse::<MaterialChoice>() {
                    Ok(choice) => {
                        accepting.store(false, Ordering::SeqCst);
                        if inputs.send(HandshakeInput::MaterialChosen(choice)).await.is_err() {
                            tracing::warn!("gatekeeper stopped; material choice discarded");
                            break;
                        }
                    }
                    Err(_) => eprintln!("Please type 'own' or 'paid'."),
                }
            }
        })
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        self.replace_choice_reader(None);
    }
}

#[async_trait]
impl PresentationSink for TerminalSink {
    async fn prompt_credential(&self) -> Option<String> {
        eprintln!("Print authorization required.");
        eprintln!("Enter your email address (leave empty to cancel):");
        self.lines.lock().await.next().await
    }

    fn render_material_choice(&self, welcome_name: &str, materials: &[MaterialOption]) {
        eprintln!();
        eprintln!("{}", welcome_line(welcome_name));
        eprintln!("{}", material_list_text(materials));
        eprintln!("Are you using your own material or paying for it? Type 'own' or 'paid':");
        self.modal_open.store(true, Ordering::SeqCst);
        self.accepting.store(true, Ordering::SeqCst);
        let reader = self.spawn_choice_reader();
        self.replace_choice_reader(Some(reader));
    }

    fn disable_choice_inputs(&self, disabled: bool) {
        self.accepting.store(!disabled, Ordering::SeqCst);
        if disabled {
            eprintln!("Confirming material choice...");
        } else {
            eprintln!("Type 'own' or 'paid' to try again:");
        }
    }

    fn notify(&self, notification: &Notification) {
        eprintln!(
            "[{}] {}: {}",
            notification.kind, notification.title, notification.message
        );
    }

    fn close_modal(&self) {
        self.modal_open.store(false, Ordering::SeqCst);
        self.accepting.store(false, Ordering::SeqCst);
        self.replace_choice_reader(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn sink() -> (
        TerminalSink,
        mpsc::UnboundedSender<String>,
        mpsc::Receiver<HandshakeInput>,
    ) {
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::channel(8);
        (TerminalSink::with_lines(line_rx, input_tx), line_tx, input_rx)
    }

    async fn next_input(rx: &mut mpsc::Receiver<HandshakeInput>) -> HandshakeInput {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_prompt_after_closed_modal_gets_typed_credential() {
        let (sink, lines, _inputs) = sink();
        sink.render_material_choice("Jane", &[]);
        sink.disable_choice_inputs(true);
        sink.close_modal();

        lines.send("a@b.com".into()).unwrap();
        let credential = tokio::time::timeout(Duration::from_secs(2), sink.prompt_credential())
            .await
            .unwrap();
        assert_eq!(credential.as_deref(), Some("a@b.com"));
    }

    #[tokio::test]
    async fn test_choice_forwarded_while_modal_open() {
        let (sink, lines, mut inputs) = sink();
        sink.render_material_choice("Jane", &[]);

        lines.send("maybe".into()).unwrap();
        lines.send("own".into()).unwrap();
        assert!(matches!(
            next_input(&mut inputs).await,
            HandshakeInput::MaterialChosen(MaterialChoice::OwnMaterial)
        ));
    }

    #[tokio::test]
    async fn test_retry_choice_after_inputs_reenabled() {
        let (sink, lines, mut inputs) = sink();
        sink.render_material_choice("Jane", &[]);

        lines.send("paid".into()).unwrap();
        assert!(matches!(
            next_input(&mut inputs).await,
            HandshakeInput::MaterialChosen(MaterialChoice::Paid)
        ));

        sink.disable_choice_inputs(true);
        sink.disable_choice_inputs(false);
        lines.send("own".into()).unwrap();
        assert!(matches!(
            next_input(&mut inputs).await,
            HandshakeInput::MaterialChosen(MaterialChoice::OwnMaterial)
        ));
    }

    #[tokio::test]
    async fn test_prompt_sees_end_of_input() {
        let (sink, lines, _inputs) = sink();
        drop(lines);
        assert_eq!(sink.prompt_credential().await, None);
    }
}
