//! Streaming recipe reader.
//!
//! The document is parsed on a blocking thread. Only the top level is walked
//! token by token: the `variables` object and each element of `steps` are
//! materialized one at a time, and only when the consumer asks for the next
//! event, so a large recipe never holds more than one step in memory.

use serde::de::{self, DeserializeSeed, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::fmt;
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::descriptor::RecipeDescriptor;
use crate::error::RecipeError;

const READER_CLOSED: &str = "recipe reader closed";

/// Top-level item read from a recipe document.
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeEvent {
    /// The `variables` object.
    Variables(Map<String, Value>),
    /// One element of the `steps` array.
    Step { index: usize, step: Value },
}

/// Pull-based reader over a recipe document.
pub struct RecipeReader {
    pulls: std_mpsc::Sender<()>,
    events: mpsc::Receiver<Result<RecipeEvent, RecipeError>>,
}

impl RecipeReader {
    /// Start reading the recipe behind a descriptor.
    pub fn open(descriptor: Arc<RecipeDescriptor>) -> Self {
        let (pull_tx, pull_rx) = std_mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel(1);

        tokio::task::spawn_blocking(move || {
            let sink = Sink {
                pulls: pull_rx,
                events: event_tx,
                granted: Cell::new(false),
                closed: Cell::new(false),
            };

            if let Err(e) = parse(&descriptor, &sink) {
                if sink.closed.get() {
                    tracing::debug!(recipe = %descriptor.name, "Recipe reader stopped early");
                } else {
                    let _ = sink.events.blocking_send(Err(e));
                }
            }
        });

        Self {
            pulls: pull_tx,
            events: event_rx,
        }
    }

    /// Read the next top-level event. `None` once the document is exhausted.
    pub async fn next(&mut self) -> Option<Result<RecipeEvent, RecipeError>> {
        // The parser may already be gone after an error; the error is still queued.
        let _ = self.pulls.send(());
        self.events.recv().await
    }
}

fn parse(descriptor: &RecipeDescriptor, sink: &Sink) -> Result<(), RecipeError> {
    let reader = descriptor.open()?;
    let mut de = serde_json::Deserializer::from_reader(reader);
    RecipeSeed { sink }.deserialize(&mut de)?;
    de.end()?;
    Ok(())
}

/// Parser side of the pull protocol.
struct Sink {
    pulls: std_mpsc::Receiver<()>,
    events: mpsc::Sender<Result<RecipeEvent, RecipeError>>,
    granted: Cell<bool>,
    closed: Cell<bool>,
}

impl Sink {
    /// Block until the consumer has asked for an event.
    fn wait_for_pull<E: de::Error>(&self) -> Result<(), E> {
        if !self.granted.get() {
            if self.pulls.recv().is_err() {
                self.closed.set(true);
                return Err(E::custom(READER_CLOSED));
            }
            self.granted.set(true);
        }
        Ok(())
    }

    fn emit<E: de::Error>(&self, event: RecipeEvent) -> Result<(), E> {
        self.granted.set(false);
        if self.events.blocking_send(Ok(event)).is_err() {
            self.closed.set(true);
            return Err(E::custom(READER_CLOSED));
        }
        Ok(())
    }
}

struct RecipeSeed<'a> {
    sink: &'a Sink,
}

impl<'de> DeserializeSeed<'de> for RecipeSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RecipeSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a recipe object")
    }

    fn visit_map<A>(self, mut map: A) -> Result<(), A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut next_index = 0;

        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "variables" => {
                    self.sink.wait_for_pull::<A::Error>()?;
                    let variables: Map<String, Value> = map.next_value()?;
                    self.sink.emit::<A::Error>(RecipeEvent::Variables(variables))?;
                }
                "steps" => map.next_value_seed(StepsSeed {
                    sink: self.sink,
                    next_index: &mut next_index,
                })?,
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }

        Ok(())
    }
}

struct StepsSeed<'a> {
    sink: &'a Sink,
    next_index: &'a mut usize,
}

impl<'de> DeserializeSeed<'de> for StepsSeed<'_> {
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> Result<(), D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for StepsSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of steps")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        loop {
            self.sink.wait_for_pull::<A::Error>()?;

            match seq.next_element::<Map<String, Value>>()? {
                Some(step) => {
                    let index = *self.next_index;
                    *self.next_index += 1;
                    self.sink.emit::<A::Error>(RecipeEvent::Step {
                        index,
                        step: Value::Object(step),
                    })?;
                }
                None => return Ok(()),
            }
        }
    }
}
