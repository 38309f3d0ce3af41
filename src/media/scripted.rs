//! Deterministic backend for the tests.
//!
//! Resources never emit anything by themselves: the tests inject the
//! signals into the feed and inspect the calls made on the resources.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    result::{Error, Result},
    types::SourceUri,
    utils::MutexUtils,
};

use super::{
    HandleId, MediaBackend, MediaResource, OpenOptions, ReadyState, SignalSink, Signals,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Open {
        handle: HandleId,
        source: SourceUri,
        options: OpenOptions,
    },
    Subscribe(HandleId, Signals),
    StartLoad(HandleId),
    Play(HandleId),
    Pause(HandleId),
    SeekToStart(HandleId),
}

#[derive(Debug, Default)]
struct Script {
    calls: Vec<Call>,
    cached: HashSet<SourceUri>,
    unreachable: HashSet<SourceUri>,
    buffered: HashMap<HandleId, (f64, f64)>,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    /// Resources opened for this source report enough data right away
    pub fn cache(&self, source: &SourceUri) {
        self.script
            .with_lock(|mut script| script.cached.insert(source.clone()));
    }

    /// Opening this source fails
    pub fn make_unreachable(&self, source: &SourceUri) {
        self.script
            .with_lock(|mut script| script.unreachable.insert(source.clone()));
    }

    pub fn set_buffered(&self, handle: HandleId, end: f64, duration: f64) {
        self.script
            .with_lock(|mut script| script.buffered.insert(handle, (end, duration)));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.with_lock(|script| script.calls.clone())
    }

    /// Handles opened for the source, oldest first
    pub fn handles(&self, source: &SourceUri) -> Vec<HandleId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Open {
                    handle,
                    source: opened,
                    ..
                } if &opened == source => Some(handle),
                _ => None,
            })
            .collect()
    }

    /// Handles opened for the source with the given options
    pub fn handles_with(&self, source: &SourceUri, options: OpenOptions) -> Vec<HandleId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Open {
                    handle,
                    source: opened,
                    options: opened_with,
                } if &opened == source && opened_with == options => Some(handle),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, f: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| f(call)).count()
    }
}

impl MediaBackend for ScriptedBackend {
    fn open(
        &self,
        source: &SourceUri,
        options: OpenOptions,
        sink: SignalSink,
    ) -> Result<Box<dyn MediaResource>> {
        let handle = sink.handle();
        self.script.with_lock(|mut script| {
            script.calls.push(Call::Open {
                handle,
                source: source.clone(),
                options,
            });

            if script.unreachable.contains(source) {
                Err(Error::DecodeOrNetworkFailure(format!("{source} unreachable")))
            } else {
                Ok(())
            }
        })?;

        Ok(Box::new(ScriptedResource {
            handle,
            source: source.clone(),
            script: self.script.clone(),
        }))
    }
}

#[derive(Debug)]
struct ScriptedResource {
    handle: HandleId,
    source: SourceUri,
    script: Arc<Mutex<Script>>,
}

impl ScriptedResource {
    fn record(&self, call: Call) {
        self.script.with_lock(|mut script| script.calls.push(call));
    }
}

impl MediaResource for ScriptedResource {
    fn subscribe(&mut self, signals: Signals) {
        self.record(Call::Subscribe(self.handle, signals));
    }

    fn start_load(&mut self) {
        self.record(Call::StartLoad(self.handle));
    }

    fn play(&mut self) {
        self.record(Call::Play(self.handle));
    }

    fn pause(&mut self) {
        self.record(Call::Pause(self.handle));
    }

    fn seek_to_start(&mut self) {
        self.record(Call::SeekToStart(self.handle));
    }

    fn ready_state(&self) -> ReadyState {
        if self
            .script
            .with_lock(|script| script.cached.contains(&self.source))
        {
            ReadyState::EnoughData
        } else {
            ReadyState::Nothing
        }
    }

    fn buffered_end(&self) -> Option<f64> {
        self.script
            .with_lock(|script| script.buffered.get(&self.handle).map(|(end, _)| *end))
    }

    fn duration(&self) -> Option<f64> {
        self.script.with_lock(|script| {
            script
                .buffered
                .get(&self.handle)
                .map(|(_, duration)| *duration)
        })
    }
}
