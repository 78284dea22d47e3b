//! Pipeline Executor: a strict left-to-right fold over stages.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use super::ExecContext;
use crate::ast::{Pipeline, Stage};
use crate::error::PipelineError;

/// Run `pipeline`, feeding `input` to its first stage.
///
/// Each stage receives the previous stage's result; groups run to
/// completion before their result moves on. The first failure aborts the
/// whole pipeline. `stage_no` counts dispatched commands across groups so
/// errors name the failing stage in execution order.
pub fn run_pipeline<'a, 'c: 'a>(
    pipeline: &'a Pipeline,
    input: Option<Value>,
    ctx: &'a mut ExecContext<'c>,
    stage_no: &'a mut usize,
) -> BoxFuture<'a, Result<Value, PipelineError>> {
    async move {
        let mut current = input;
        for stage in &pipeline.stages {
            let result = match stage {
                Stage::Group(inner) => run_pipeline(inner, current.take(), ctx, stage_no).await?,
                Stage::Command(intent) => {
                    *stage_no += 1;
                    let registry = ctx.registry;
                    registry
                        .dispatch(intent, current.take(), ctx)
                        .await
                        .map_err(|e| PipelineError::at_stage(*stage_no, intent.label(), e))?
                }
            };
            current = Some(result);
        }
        Ok(current.unwrap_or(Value::Null))
    }
    .boxed()
}
