//! Nested command runs.
//!
//! A running command may run another command as a step. The child gets its
//! own [`Invocation`] and lifecycle; what comes back into the parent is
//! either the child's result or the child's errors, copied into the parent
//! with a `subcommand` context entry naming the child.
//!
//! When the parent and the child live in different domains, the parent's
//! domain must declare a direct dependency on the child's. Undeclared calls
//! never run the child: the parent gets a `domain_dependency_not_declared`
//! runtime error instead.

use foreman_outcome::Outcome;
use serde_json::Value;

use crate::command::{Command, Execute, ExecuteAsync, Execution};
use crate::invocation::Invocation;
use crate::symbols;

impl<C: Command> Invocation<C> {
    /// Runs `S` as a step of this run.
    ///
    /// Returns `None` when the child failed or was not allowed to run. The
    /// reason is already recorded in [`errors`](Self::errors); this run is
    /// not halted.
    ///
    /// ```rust,ignore
    /// let Some(account) = run.run_subcommand::<LoadAccount>(json!({"id": id})) else {
    ///     return Err(run.halt());
    /// };
    /// ```
    pub fn run_subcommand<S: Execute>(&mut self, inputs: Value) -> Option<S::Result> {
        if !self.admit::<S>() {
            return None;
        }
        let outcome = self
            .foreman
            .run_nested::<S>(inputs, self.child_runtime_path(), self.depth + 1);
        self.absorb::<S>(outcome)
    }

    /// Like [`run_subcommand`](Self::run_subcommand), but halts this run
    /// when the child does not produce a result.
    ///
    /// ```rust,ignore
    /// run.run_subcommand_bang::<Withdraw>(json!({"account": from, "amount": amount}))?;
    /// ```
    pub fn run_subcommand_bang<S: Execute>(&mut self, inputs: Value) -> Execution<S::Result> {
        match self.run_subcommand::<S>(inputs) {
            Some(result) => Ok(result),
            None => Err(self.halt()),
        }
    }

    /// Suspending form of [`run_subcommand`](Self::run_subcommand).
    pub async fn run_subcommand_async<S: ExecuteAsync>(&mut self, inputs: Value) -> Option<S::Result> {
        if !self.admit::<S>() {
            return None;
        }
        let outcome = self
            .foreman
            .run_nested_async::<S>(inputs, self.child_runtime_path(), self.depth + 1)
            .await;
        self.absorb::<S>(outcome)
    }

    /// Suspending form of [`run_subcommand_bang`](Self::run_subcommand_bang).
    pub async fn run_subcommand_async_bang<S: ExecuteAsync>(
        &mut self,
        inputs: Value,
    ) -> Execution<S::Result> {
        match self.run_subcommand_async::<S>(inputs).await {
            Some(result) => Ok(result),
            None => Err(self.halt()),
        }
    }

    /// Checks depth and domain permission. Records the reason and returns
    /// false when the child must not run.
    fn admit<S: Command>(&mut self) -> bool {
        let child = self.foreman.metadata::<S>();
        let config = self.foreman.config().clone();

        if self.depth + 1 > config.max_subcommand_depth {
            let depth = self.depth + 1;
            self.add_runtime_error(
                symbols::SUBCOMMAND_DEPTH_EXCEEDED,
                format!(
                    "running {} would nest {} levels deep (limit {})",
                    child.name, depth, config.max_subcommand_depth
                ),
            )
            .insert_context("subcommand", child.name.as_str())
            .insert_context("depth", depth);
            return false;
        }

        let (Some(from), Some(to)) = (self.metadata.domain.clone(), child.domain.clone()) else {
            return true;
        };
        if from == to {
            return true;
        }

        let foreman = self.foreman.clone();
        let graph = foreman.domains();
        if config.enforce_domain_dependencies && !graph.can_call(&from, &to) {
            tracing::warn!(
                component = module_path!(),
                op = "subcommand_denied",
                command = %self.metadata.name,
                subcommand = %child.name,
                from_domain = %from,
                to_domain = %to,
            );
            self.add_runtime_error(
                symbols::DOMAIN_DEPENDENCY_NOT_DECLARED,
                format!(
                    "domain {} must declare a dependency on domain {} to run {}",
                    from, to, child.name
                ),
            )
            .insert_context("subcommand", child.name.as_str())
            .insert_context("from_domain", from.as_str())
            .insert_context("to_domain", to.as_str());
            return false;
        }

        if config.track_cross_domain_calls {
            graph.track_cross_domain_call(&from, &to);
        }
        true
    }

    fn child_runtime_path(&self) -> Vec<String> {
        let mut path = self.runtime_path.clone();
        path.push(self.metadata.name.clone());
        path
    }

    /// Takes the child's result, or copies its errors into this run.
    fn absorb<S: Command>(&mut self, outcome: Outcome<S::Result>) -> Option<S::Result> {
        match outcome {
            Outcome::Success(result) => Some(result),
            Outcome::Failure(errors) => {
                let child = self.foreman.metadata::<S>();
                for mut record in errors {
                    record.insert_context("subcommand", child.name.as_str());
                    self.errors.add(record);
                }
                None
            }
        }
    }
}
