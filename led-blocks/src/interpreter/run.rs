use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tokio::task::yield_now;
use tokio::time::{Duration, Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ir::{ExprKind, MAX_PIN, Node, NodeKind, Operand};

use super::eval::{Value, Variables, evaluate};
use super::sink::{GpioBank, PanelSink};

/// Text of the color block that picks from the palette
pub const RANDOM_COLOR: &str = "RANDOM";

/// Walks a program tree against a panel until it ends or the token fires
pub(crate) struct Machine {
    sink: Arc<dyn PanelSink>,
    gpio: Arc<GpioBank>,
    token: CancellationToken,
    variables: Variables,
    palette: Vec<String>,
    rng: StdRng,
    executed: usize,
}

impl Machine {
    pub(crate) fn new(
        sink: Arc<dyn PanelSink>,
        gpio: Arc<GpioBank>,
        token: CancellationToken,
        palette: Vec<String>,
        rng: StdRng,
    ) -> Self {
        Self {
            sink,
            gpio,
            token,
            variables: Variables::new(),
            palette,
            rng,
            executed: 0,
        }
    }

    /// Statements executed so far
    pub(crate) fn executed(&self) -> usize {
        self.executed
    }

    fn stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Выполняет цепочку по `next`, проверяя остановку перед каждым блоком
    pub(crate) fn execute_chain<'a>(&'a mut self, head: Option<&'a Node>) -> BoxFuture<'a, ()> {
        async move {
            let mut cursor = head;
            while let Some(node) = cursor {
                if self.stopped() {
                    return;
                }
                self.execute(node).await;
                cursor = node.next.as_deref();
            }
        }
        .boxed()
    }

    async fn execute(&mut self, node: &Node) {
        self.executed += 1;
        debug!(kind = %node.kind(), id = ?node.id, "execute");

        match &node.kind {
            NodeKind::DisplayImage { filename } => self.sink.display_image(filename),
            NodeKind::PlayAnimation { folder, play_for } => {
                self.play_animation(folder, Duration::from_millis(*play_for)).await;
            }
            NodeKind::Wait { time } => {
                let millis = self.value(time.as_ref()).as_number().max(0);
                self.pause(Duration::from_millis(millis.unsigned_abs())).await;
            }
            NodeKind::SetColor { color } => self.set_color(color.as_ref()),
            NodeKind::SetVariable { var_name, value } => {
                let value = self.value(value.as_ref());
                debug!(var_name = var_name.as_str(), %value, "set variable");
                self.variables.set(var_name, value);
            }
            NodeKind::Gpio { pin, state } => {
                if *pin > MAX_PIN {
                    warn!(pin, "GPIO pin out of range, ignoring");
                } else {
                    self.gpio.set(*pin, state.is_high());
                    self.sink.set_gpio_indicator(*pin, state.is_high());
                }
            }
            NodeKind::If { condition, true_branch, false_branch } => {
                let branch = if self.value(condition.as_ref()).is_truthy() {
                    true_branch
                } else {
                    false_branch
                };
                self.execute_chain(branch.head()).await;
            }
            NodeKind::IfGpio { pin, state, true_branch, false_branch } => {
                // Пин читается заново при каждом проходе
                let branch = if self.gpio.read(*pin) == state.is_high() {
                    true_branch
                } else {
                    false_branch
                };
                self.execute_chain(branch.head()).await;
            }
            NodeKind::Repeat { times, loop_body } => {
                let times = self.value(times.as_ref()).as_number();
                for _ in 0..times.max(0) {
                    if self.stopped() {
                        break;
                    }
                    self.execute_chain(loop_body.head()).await;
                    yield_now().await;
                }
            }
            NodeKind::Forever { loop_body } => {
                while !self.stopped() {
                    self.execute_chain(loop_body.head()).await;
                    yield_now().await;
                }
            }
            NodeKind::While { condition, loop_body } => {
                while !self.stopped() && self.value(condition.as_ref()).is_truthy() {
                    self.execute_chain(loop_body.head()).await;
                    yield_now().await;
                }
            }
            NodeKind::Break => debug!("break has no effect outside the editor"),
            NodeKind::GpioTrigger { pin, trigger, .. } => {
                info!(pin, trigger = trigger.name(), "GPIO triggers are not evaluated during preview");
            }
            NodeKind::Start { .. } => warn!("nested start block, skipping"),
            NodeKind::Number(_)
            | NodeKind::RandomRange(_)
            | NodeKind::Compare(_)
            | NodeKind::GetVariable(_)
            | NodeKind::ColorValue(_)
            | NodeKind::CustomColor(_)
            | NodeKind::RgbColor(_) => {
                warn!(kind = %node.kind(), "value block used as a statement, skipping");
            }
        }
    }

    fn value(&mut self, operand: Option<&Operand>) -> Value {
        evaluate(operand, &self.variables, &mut self.rng)
    }

    /// Sleeps for `duration`; returns false when the run was stopped meanwhile
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    async fn play_animation(&mut self, folder: &str, duration: Duration) {
        let frames = self.sink.animation_frames(folder);
        if frames == 0 {
            warn!(folder, "animation not found");
            return;
        }

        let frame_time = duration / u32::try_from(frames).unwrap_or(u32::MAX);
        let started = Instant::now();
        let mut index = 0;
        while started.elapsed() < duration && !self.stopped() {
            self.sink.show_animation_frame(folder, index % frames);
            index += 1;
            if !self.pause(frame_time).await {
                break;
            }
            if frame_time.is_zero() {
                yield_now().await;
            }
        }
    }

    fn set_color(&mut self, color: Option<&Operand>) {
        // rgb_color здесь форматируется как rgb(r, g, b), а не hex
        let color = match color {
            Some(Operand::Expr(expression)) => match &expression.kind {
                ExprKind::RgbColor(rgb) => Value::Text(rgb.to_css()),
                _ => self.value(color),
            },
            Some(_) => self.value(color),
            None => {
                warn!("set_color without a color, ignoring");
                return;
            }
        };

        // Числа и логические значения уходят в панель текстом
        let text = match color {
            Value::Text(text) => text,
            other => other.to_string(),
        };
        if text == RANDOM_COLOR {
            match self.palette.choose(&mut self.rng) {
                Some(pick) => self.sink.set_color(pick),
                None => warn!("random color requested with an empty palette"),
            }
        } else {
            self.sink.set_color(&text);
        }
    }
}
