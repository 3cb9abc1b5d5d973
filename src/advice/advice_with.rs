use std::sync::Arc;

use super::weave::{self, Selection, WeaveEdit, WeaveOperation, WeaveSelector};
use crate::{
    Result,
    model::{InterceptSendToEndpointDefinition, MockEndpointsDefinition, NodeIdFactory, Predicate, RouteDefinition, StepsBuilder},
};

/// Working copy of a route being advised.
///
/// Every weave is applied as soon as it is requested, so later weaves see
/// the nodes inserted by earlier ones. The engine only swaps the advised
/// copy in once the whole advice succeeded.
pub struct AdviceWithRoute {
    route: RouteDefinition,
    ids: Arc<NodeIdFactory>,
    edits: Vec<WeaveEdit>,
}

impl AdviceWithRoute {
    pub fn new(
        route: RouteDefinition,
        ids: Arc<NodeIdFactory>,
    ) -> Self {
        Self {
            route,
            ids,
            edits: Vec::new(),
        }
    }

    pub fn route(&self) -> &RouteDefinition {
        &self.route
    }

    /// Edits applied so far, in order.
    pub fn edits(&self) -> &[WeaveEdit] {
        &self.edits
    }

    pub fn into_definition(self) -> RouteDefinition {
        self.route
    }

    /// Weave the node with this exact id.
    pub fn weave_by_id(
        &mut self,
        id: impl Into<String>,
    ) -> WeaveBuilder<'_> {
        self.weave(WeaveSelector::Id(id.into()))
    }

    /// Weave every node sending to an endpoint matching `pattern`.
    pub fn weave_by_to_uri(
        &mut self,
        pattern: impl Into<String>,
    ) -> WeaveBuilder<'_> {
        self.weave(WeaveSelector::ToUri(pattern.into()))
    }

    /// Weave every node whose to-string form matches the regex `pattern`.
    pub fn weave_by_to_string(
        &mut self,
        pattern: impl Into<String>,
    ) -> WeaveBuilder<'_> {
        self.weave(WeaveSelector::ToString(pattern.into()))
    }

    pub fn weave_by_type(
        &mut self,
        short_name: impl Into<String>,
    ) -> WeaveBuilder<'_> {
        self.weave(WeaveSelector::Type(short_name.into()))
    }

    pub fn weave_add_first(
        &mut self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Result<()> {
        self.apply(WeaveEdit::new(WeaveSelector::First, WeaveOperation::Before, f(StepsBuilder::new()).into_nodes()))
    }

    pub fn weave_add_last(
        &mut self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Result<()> {
        self.apply(WeaveEdit::new(WeaveSelector::Last, WeaveOperation::After, f(StepsBuilder::new()).into_nodes()))
    }

    /// Replace the route input. The uri is resolved when the advised route
    /// is built.
    pub fn replace_from_with(
        &mut self,
        uri: impl Into<String>,
    ) {
        let uri = uri.into();
        tracing::info!(route_id = %self.route.route_id(), "AdviceWith replace input from [{}] --> [{}]", self.route.input_uri().unwrap_or_default(), uri);
        self.route.set_input(uri);
    }

    /// Intercept sends to endpoints matching `pattern` in this route.
    pub fn intercept_send_to_endpoint(
        &mut self,
        pattern: impl Into<String>,
    ) -> InterceptSendBuilder<'_> {
        InterceptSendBuilder {
            advice: self,
            definition: InterceptSendToEndpointDefinition {
                uri: pattern.into(),
                ..Default::default()
            },
        }
    }

    /// Copy sends to endpoints matching `pattern` to `mock:<scheme>:<path>`.
    pub fn mock_endpoints(
        &mut self,
        pattern: impl Into<String>,
    ) {
        self.route.add_mock_endpoints(MockEndpointsDefinition {
            pattern: pattern.into(),
            skip: false,
        });
    }

    /// Send to `mock:<scheme>:<path>` instead of endpoints matching `pattern`.
    pub fn mock_endpoints_and_skip(
        &mut self,
        pattern: impl Into<String>,
    ) {
        self.route.add_mock_endpoints(MockEndpointsDefinition {
            pattern: pattern.into(),
            skip: true,
        });
    }

    fn weave(
        &mut self,
        selector: WeaveSelector,
    ) -> WeaveBuilder<'_> {
        WeaveBuilder {
            advice: self,
            selector,
            selection: Selection::All,
        }
    }

    fn apply(
        &mut self,
        edit: WeaveEdit,
    ) -> Result<()> {
        weave::apply_edit(&mut self.route, &edit, &self.ids)?;
        self.edits.push(edit);
        Ok(())
    }
}

/// Selects nodes for one weave; finished by an operation.
pub struct WeaveBuilder<'a> {
    advice: &'a mut AdviceWithRoute,
    selector: WeaveSelector,
    selection: Selection,
}

impl WeaveBuilder<'_> {
    pub fn select_first(mut self) -> Self {
        self.selection = Selection::First;
        self
    }

    pub fn select_last(mut self) -> Self {
        self.selection = Selection::Last;
        self
    }

    /// Only the n-th match, counting from 0.
    pub fn select_index(
        mut self,
        index: usize,
    ) -> Self {
        self.selection = Selection::Index(index);
        self
    }

    /// Matches `from` to `to`, both inclusive.
    pub fn select_range(
        mut self,
        from: usize,
        to: usize,
    ) -> Self {
        self.selection = Selection::Range(from, to);
        self
    }

    pub fn before(
        self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Result<()> {
        self.finish(WeaveOperation::Before, f(StepsBuilder::new()))
    }

    pub fn after(
        self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Result<()> {
        self.finish(WeaveOperation::After, f(StepsBuilder::new()))
    }

    /// Replace the matched nodes, children included.
    pub fn replace(
        self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) -> Result<()> {
        self.finish(WeaveOperation::Replace, f(StepsBuilder::new()))
    }

    pub fn remove(self) -> Result<()> {
        self.finish(WeaveOperation::Remove, StepsBuilder::new())
    }

    fn finish(
        self,
        operation: WeaveOperation,
        steps: StepsBuilder,
    ) -> Result<()> {
        let edit = WeaveEdit::new(self.selector, operation, steps.into_nodes()).with_selection(self.selection);
        self.advice.apply(edit)
    }
}

/// Configures an intercept-send-to-endpoint; finished by `steps` or `done`.
pub struct InterceptSendBuilder<'a> {
    advice: &'a mut AdviceWithRoute,
    definition: InterceptSendToEndpointDefinition,
}

impl InterceptSendBuilder<'_> {
    /// Only intercept exchanges matching the predicate.
    pub fn when(
        mut self,
        predicate: Predicate,
    ) -> Self {
        self.definition.when = Some(predicate);
        self
    }

    pub fn skip_send_to_original_endpoint(mut self) -> Self {
        self.definition.skip_send_to_original_endpoint = true;
        self
    }

    /// Send to `uri` after the original endpoint.
    pub fn after_uri(
        mut self,
        uri: impl Into<String>,
    ) -> Self {
        self.definition.after_uri = Some(uri.into());
        self
    }

    /// Steps run before the original send.
    pub fn steps(
        mut self,
        f: impl FnOnce(StepsBuilder) -> StepsBuilder,
    ) {
        let mut outputs = f(StepsBuilder::new()).into_nodes();
        self.advice.ids.assign_ids(&mut outputs);
        self.definition.outputs = outputs;
        self.done();
    }

    pub fn done(self) {
        tracing::info!(route_id = %self.advice.route.route_id(), "AdviceWith intercept send to endpoint [{}]", self.definition.uri);
        self.advice.route.add_intercept_send_to_endpoint(self.definition);
    }
}
