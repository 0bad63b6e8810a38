/// A function the model may ask the caller to invoke
///
/// Implementations describe the tool; executing it is up to the caller,
/// who answers each [`Part::ToolCall`](super::Part::ToolCall) with a
/// [`Part::ToolResult`](super::Part::ToolResult) on the next turn.
pub trait Tool: Send + Sync {
    /// Name the model uses to call the tool
    fn name(&self) -> &str;

    /// What the tool does
    ///
    /// The more detail the model has about the tool and its input, the
    /// better it will use it. Empty descriptions are omitted from requests.
    fn description(&self) -> &str;

    /// JSON schema of the input object the tool accepts
    ///
    /// Only `type`, `properties` and `required` are read.
    fn schema(&self) -> serde_json::Value;
}

/// Generate a tool input schema from a Rust type
pub fn schema_for<T: schemars::JsonSchema>() -> serde_json::Value {
    let mut schema = schemars::schema_for!(T).to_value();

    if let Some(object) = schema.as_object_mut() {
        object.remove("$schema");
    }

    schema
}
