//! Generic finite-state-machine engine.
//!
//! This crate provides a reusable state/event machine runtime with no
//! domain knowledge. A [`TransitionTable`] maps (state, event) pairs to a
//! next state plus an optional side-effect descriptor; a [`Machine`] is a
//! short-lived handle seeded at some initial state that submits one event
//! at a time against the table.
//!
//! The transition computation is a pure lookup and never suspends. Side
//! effects are returned as data for the caller to execute. The only async
//! seam is the post-transition interceptor, which observers such as a
//! persistence layer use to commit the state change before the handle is
//! updated; an interceptor error vetoes the transition.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by the state machine engine.
#[derive(Debug, Error)]
pub enum MachineError<S: fmt::Debug, E: fmt::Debug> {
	/// A machine was instantiated at a state the table does not recognize.
	#[error("unrecognized state {state:?}")]
	InvalidState { state: S },
	/// No transition is defined for the submitted (state, event) pair.
	#[error("no transition from {state:?} on {event:?}")]
	IllegalTransition { state: S, event: E },
	/// The post-transition interceptor vetoed the state change.
	#[error("transition interceptor failed: {0}")]
	Interceptor(String),
}

/// Observer invoked after a transition has been computed but before the
/// machine handle is updated.
///
/// Returning an error vetoes the transition: the handle keeps its previous
/// state and the error is surfaced to the submitter. Interceptors must not
/// retry on their own; retry policy belongs to the caller.
#[async_trait]
pub trait TransitionInterceptor<S, E, C>: Send + Sync {
	/// Called with the previous state, the submitted event, the computed
	/// next state and the caller-supplied context.
	async fn state_changed(
		&self,
		previous: &S,
		event: &E,
		next: &S,
		context: &C,
	) -> Result<(), String>;
}

/// Outcome of a successful event submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionResult<S, A> {
	/// State the machine was in before the event.
	pub previous: S,
	/// State the machine moved to.
	pub next: S,
	/// Side effect the caller should execute, if the table defines one.
	pub effect: Option<A>,
}

/// Immutable lookup table of allowed transitions.
///
/// Built once via [`TransitionTable::builder`] and shared by reference
/// between machine instances. The table also tracks the set of recognized
/// states (every state that appears as a source or target) so that
/// instantiation at an unknown state fails loudly.
pub struct TransitionTable<S, E, A> {
	transitions: HashMap<(S, E), (S, Option<A>)>,
	states: HashSet<S>,
}

impl<S, E, A> TransitionTable<S, E, A>
where
	S: Copy + Eq + Hash + fmt::Debug,
	E: Copy + Eq + Hash + fmt::Debug,
{
	/// Starts building a new transition table.
	pub fn builder() -> TransitionTableBuilder<S, E, A> {
		TransitionTableBuilder {
			transitions: HashMap::new(),
			states: HashSet::new(),
		}
	}

	/// Returns true if the table recognizes the given state.
	pub fn recognizes(&self, state: &S) -> bool {
		self.states.contains(state)
	}

	/// Returns true if a transition is defined for (state, event).
	pub fn has_transition(&self, state: S, event: E) -> bool {
		self.transitions.contains_key(&(state, event))
	}

	/// Allocates a fresh machine handle seeded at `initial`.
	pub fn instantiate<C>(&self, initial: S) -> Result<Machine<'_, S, E, A, C>, MachineError<S, E>> {
		if !self.recognizes(&initial) {
			return Err(MachineError::InvalidState { state: initial });
		}
		Ok(Machine {
			table: self,
			state: initial,
			interceptor: None,
		})
	}

	fn lookup(&self, state: S, event: E) -> Option<&(S, Option<A>)> {
		self.transitions.get(&(state, event))
	}
}

/// Builder for [`TransitionTable`].
pub struct TransitionTableBuilder<S, E, A> {
	transitions: HashMap<(S, E), (S, Option<A>)>,
	states: HashSet<S>,
}

impl<S, E, A> TransitionTableBuilder<S, E, A>
where
	S: Copy + Eq + Hash,
	E: Copy + Eq + Hash,
{
	/// Defines a transition with no side effect.
	pub fn transition(self, from: S, event: E, to: S) -> Self {
		self.insert(from, event, to, None)
	}

	/// Defines a transition with a side effect for the caller to execute.
	pub fn transition_with(self, from: S, event: E, to: S, effect: A) -> Self {
		self.insert(from, event, to, Some(effect))
	}

	fn insert(mut self, from: S, event: E, to: S, effect: Option<A>) -> Self {
		self.states.insert(from);
		self.states.insert(to);
		self.transitions.insert((from, event), (to, effect));
		self
	}

	/// Finalizes the table.
	pub fn build(self) -> TransitionTable<S, E, A> {
		TransitionTable {
			transitions: self.transitions,
			states: self.states,
		}
	}
}

/// A short-lived machine instance seeded at one state.
///
/// Instances are logically single-threaded: they take `&mut self` on
/// submit, so one instance processes one event at a time. Callers that
/// need cross-call consistency rehydrate a fresh instance from persisted
/// state instead of caching handles.
pub struct Machine<'t, S, E, A, C> {
	table: &'t TransitionTable<S, E, A>,
	state: S,
	interceptor: Option<Arc<dyn TransitionInterceptor<S, E, C>>>,
}

impl<S, E, A, C> Machine<'_, S, E, A, C>
where
	S: Copy + Eq + Hash + fmt::Debug + Send + Sync,
	E: Copy + Eq + Hash + fmt::Debug + Send + Sync,
	A: Clone,
	C: Sync,
{
	/// Registers the interceptor invoked after every successful transition.
	pub fn with_interceptor(mut self, interceptor: Arc<dyn TransitionInterceptor<S, E, C>>) -> Self {
		self.interceptor = Some(interceptor);
		self
	}

	/// Current state of this handle.
	pub fn state(&self) -> S {
		self.state
	}

	/// Submits one event against the current state.
	///
	/// On a defined transition the interceptor (if any) runs first; its
	/// error vetoes the change and leaves the handle untouched. On an
	/// undefined (state, event) pair the handle is left untouched and
	/// [`MachineError::IllegalTransition`] is returned.
	pub async fn submit(
		&mut self,
		event: E,
		context: &C,
	) -> Result<TransitionResult<S, A>, MachineError<S, E>> {
		let (next, effect) = self
			.table
			.lookup(self.state, event)
			.ok_or(MachineError::IllegalTransition {
				state: self.state,
				event,
			})?;

		if let Some(interceptor) = &self.interceptor {
			interceptor
				.state_changed(&self.state, &event, next, context)
				.await
				.map_err(MachineError::Interceptor)?;
		}

		let previous = self.state;
		self.state = *next;

		Ok(TransitionResult {
			previous,
			next: self.state,
			effect: effect.clone(),
		})
	}
}
