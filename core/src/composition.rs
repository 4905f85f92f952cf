//! Reducer composition utilities
//!
//! A feature reducer owns a slice of the application state and a slice of the
//! application action space. [`scope_reducer`] lifts it into the parent:
//!
//! - a **state lens** (`fn(&mut S) -> &mut SubS`) focuses the child's state,
//! - an **extract** function picks the child's actions out of the parent enum,
//! - an **embed** function wraps the child's feedback actions back up.
//!
//! # Examples
//!
//! ```
//! use marketplace_sync_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
//! use marketplace_sync_core::composition::scope_reducer;
//!
//! #[derive(Clone, Default)]
//! struct CounterState {
//!     count: i32,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! #[derive(Clone)]
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(&self, state: &mut CounterState, _action: CounterAction, _env: &()) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         state.count += 1;
//!         smallvec![Effect::None]
//!     }
//! }
//!
//! #[derive(Clone, Default)]
//! struct AppState {
//!     counter: CounterState,
//!     title: String,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     Rename(String),
//! }
//!
//! let scoped = scope_reducer(
//!     CounterReducer,
//!     |app: &mut AppState| &mut app.counter,
//!     |action: AppAction| match action {
//!         AppAction::Counter(action) => Some(action),
//!         AppAction::Rename(_) => None,
//!     },
//!     AppAction::Counter,
//! );
//!
//! let mut state = AppState::default();
//! let _ = scoped.reduce(&mut state, AppAction::Counter(CounterAction::Increment), &());
//! let _ = scoped.reduce(&mut state, AppAction::Rename("shop".into()), &());
//! assert_eq!(state.counter.count, 1);
//! ```

use crate::effect::Effect;
use crate::reducer::Reducer;
use smallvec::SmallVec;

/// Scopes a child reducer to a slice of parent state and parent actions.
///
/// Actions the `extract` function rejects are ignored by the scoped reducer
/// and produce no effects.
pub const fn scope_reducer<S, SubS, A, SubA, E, R>(
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    extract: fn(A) -> Option<SubA>,
    embed: fn(SubA) -> A,
) -> ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    ScopedReducer {
        reducer,
        state,
        extract,
        embed,
        _phantom: std::marker::PhantomData,
    }
}

/// A reducer lifted into a parent state/action space.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
{
    reducer: R,
    state: fn(&mut S) -> &mut SubS,
    extract: fn(A) -> Option<SubA>,
    embed: fn(SubA) -> A,
    _phantom: std::marker::PhantomData<fn() -> E>,
}

impl<S, SubS, A, SubA, E, R> ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
    A: Send + 'static,
    SubA: Send + 'static,
{
    /// Run a child action directly against the focused state.
    ///
    /// Parents use this to relay a transition from one feature into another
    /// without routing through the parent action type.
    pub fn reduce_child(
        &self,
        state: &mut S,
        action: SubA,
        env: &E,
    ) -> SmallVec<[Effect<A>; 4]> {
        self.reducer
            .reduce((self.state)(state), action, env)
            .into_iter()
            .filter(|effect| !effect.is_none())
            .map(|effect| effect.map(self.embed))
            .collect()
    }
}

impl<S, SubS, A, SubA, E, R> Clone for ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E> + Clone,
{
    fn clone(&self) -> Self {
        Self {
            reducer: self.reducer.clone(),
            state: self.state,
            extract: self.extract,
            embed: self.embed,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<S, SubS, A, SubA, E, R> Reducer for ScopedReducer<S, SubS, A, SubA, E, R>
where
    R: Reducer<State = SubS, Action = SubA, Environment = E>,
    A: Send + 'static,
    SubA: Send + 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match (self.extract)(action) {
            Some(child) => self.reduce_child(state, child, env),
            None => SmallVec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smallvec;

    #[derive(Clone, Default)]
    struct SubState {
        value: i32,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum SubAction {
        Add(i32),
        Echo(i32),
        Echoed(i32),
    }

    #[derive(Clone)]
    struct SubReducer;

    impl Reducer for SubReducer {
        type State = SubState;
        type Action = SubAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                SubAction::Add(n) => {
                    state.value += n;
                    smallvec![Effect::None]
                },
                SubAction::Echo(n) => {
                    smallvec![Effect::future(async move { Some(SubAction::Echoed(n)) })]
                },
                SubAction::Echoed(_) => SmallVec::new(),
            }
        }
    }

    #[derive(Clone, Default)]
    struct ParentState {
        sub: SubState,
        other: String,
    }

    #[derive(Clone, Debug, PartialEq)]
    enum ParentAction {
        Sub(SubAction),
        Other,
    }

    fn scoped() -> ScopedReducer<ParentState, SubState, ParentAction, SubAction, (), SubReducer> {
        scope_reducer(
            SubReducer,
            |parent: &mut ParentState| &mut parent.sub,
            |action| match action {
                ParentAction::Sub(action) => Some(action),
                ParentAction::Other => None,
            },
            ParentAction::Sub,
        )
    }

    #[test]
    fn scoped_reducer_touches_only_its_slice() {
        let reducer = scoped();
        let mut state = ParentState {
            sub: SubState { value: 5 },
            other: "kept".to_string(),
        };

        let effects = reducer.reduce(&mut state, ParentAction::Sub(SubAction::Add(3)), &());
        assert_eq!(state.sub.value, 8);
        assert_eq!(state.other, "kept");
        assert!(effects.is_empty(), "no-op effects are dropped");

        let effects = reducer.reduce(&mut state, ParentAction::Other, &());
        assert!(effects.is_empty());
        assert_eq!(state.sub.value, 8);
    }

    #[tokio::test]
    async fn scoped_effects_are_embedded() {
        let reducer = scoped();
        let mut state = ParentState::default();

        let mut effects = reducer.reduce(&mut state, ParentAction::Sub(SubAction::Echo(4)), &());
        assert_eq!(effects.len(), 1);

        let Some(Effect::Future(fut)) = effects.pop() else {
            unreachable!("echo produces a future");
        };
        assert_eq!(fut.await, Some(ParentAction::Sub(SubAction::Echoed(4))));
    }
}
