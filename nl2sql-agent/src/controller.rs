//! The agent controller (spec §4.5): wires the catalog, retrieval
//! engine, SQL pipeline, and chat provider together into the
//! tool-calling loop. `Agent::ask` is the entry point — it drives the
//! LLM through `ChatProvider::complete`, dispatches whatever tools it
//! calls, and returns once the model produces a final answer with no
//! further tool calls.

use std::sync::Arc;

use nl2sql_catalog::Catalog;
use nl2sql_core::{AgentConfig, ChatCompletion, ChatMessage, ChatProvider, ChatRole, Nl2SqlResult};
use nl2sql_retrieval::{cache_few_shot, clear_turn_caches, get_cached_few_shot, get_cached_metadata, cache_metadata, question_hash, CacheOutcome, ExampleCandidate, GlossaryCandidate, RetrievalEngine, TableCandidate};
use nl2sql_sql::{record_validated_query, SqlPipeline, ValidatedQuery};
use nl2sql_warehouse::{DryRunOutcome, InsertOutcome, QueryMemoryStore};
use serde_json::{json, Value};

use crate::loop_guard::{pre_tool_guard, record_call, record_dry_run_outcome};
use crate::prompt::{render_dynamic_context, static_system_prompt, DynamicContext};
use crate::state::TurnState;
use crate::tools::{tool_definitions, ToolName};

/// The per-question agent. Holds everything a turn needs; one instance
/// serves many sequential `ask` calls (spec §5: single session, not
/// safe to share across concurrent sessions — same constraint as the
/// turn caches it drives).
pub struct Agent {
    config: AgentConfig,
    catalog: Arc<Catalog>,
    retrieval: Arc<RetrievalEngine>,
    sql_pipeline: Arc<SqlPipeline>,
    chat_provider: Arc<dyn ChatProvider>,
    query_memory_store: Arc<dyn QueryMemoryStore>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        catalog: Arc<Catalog>,
        retrieval: Arc<RetrievalEngine>,
        sql_pipeline: Arc<SqlPipeline>,
        chat_provider: Arc<dyn ChatProvider>,
        query_memory_store: Arc<dyn QueryMemoryStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            retrieval,
            sql_pipeline,
            chat_provider,
            query_memory_store,
        }
    }

    /// Answer one question end to end: system + user message, then loop
    /// on `ChatProvider::complete` until it returns a final answer with
    /// no tool calls (spec §4.5.6).
    pub async fn ask(&self, question: &str) -> Nl2SqlResult<String> {
        let mut state = TurnState::new();
        let mut dynamic = DynamicContext::default();
        let tools = tool_definitions();

        let mut messages = vec![
            ChatMessage {
                role: ChatRole::System,
                content: self.system_prompt(&dynamic),
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
            ChatMessage {
                role: ChatRole::User,
                content: question.to_string(),
                tool_calls: Vec::new(),
                tool_call_id: None,
            },
        ];

        loop {
            let completion: ChatCompletion = self.chat_provider.complete(&messages, &tools).await?;

            if completion.is_final() {
                return Ok(completion.content.unwrap_or_default());
            }

            messages.push(ChatMessage {
                role: ChatRole::Assistant,
                content: completion.content.clone().unwrap_or_default(),
                tool_calls: completion.tool_calls.clone(),
                tool_call_id: None,
            });

            for call in &completion.tool_calls {
                let tool_name = call.name.as_str();

                if tool_name == ToolName::CheckSemanticCache.as_str() {
                    state.reset_for_new_question();
                    clear_turn_caches();
                }

                let guard = pre_tool_guard(
                    &state,
                    tool_name,
                    &call.arguments,
                    self.config.max_consecutive_repeats,
                    self.config.max_tool_calls_per_turn,
                );

                let result = match guard {
                    Err(err) => error_result(err.to_string()),
                    Ok(()) => {
                        record_call(&mut state, tool_name, &call.arguments);
                        self.dispatch_tool(tool_name, &call.arguments, &mut state, &mut dynamic).await
                    }
                };

                dynamic.last_tool_error = match result.get("status").and_then(Value::as_str) {
                    Some("error") => result.get("error_message").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                };

                messages.push(ChatMessage {
                    role: ChatRole::Tool,
                    content: result.to_string(),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(call.id.clone()),
                });
            }

            messages[0].content = self.system_prompt(&dynamic);
        }
    }

    fn system_prompt(&self, dynamic: &DynamicContext) -> String {
        let static_section = static_system_prompt(&self.catalog.routing);
        let dynamic_section = render_dynamic_context(dynamic, self.config.sql_preview_chars, self.config.row_preview_count);
        if dynamic_section.is_empty() {
            static_section.to_string()
        } else {
            format!("{static_section}\n\n## Current turn context\n{dynamic_section}")
        }
    }

    async fn dispatch_tool(&self, tool_name: &str, args: &Value, state: &mut TurnState, dynamic: &mut DynamicContext) -> Value {
        let Some(tool) = ToolName::from_str(tool_name) else {
            return error_result(format!("unknown tool: {tool_name}"));
        };

        match tool {
            ToolName::CheckSemanticCache => self.tool_check_semantic_cache(args, state).await,
            ToolName::ResolveExchange => self.tool_resolve_exchange(args, state),
            ToolName::VectorSearchColumns => self.tool_vector_search_columns(args).await,
            ToolName::FetchFewShotExamples => self.tool_fetch_few_shot_examples(args).await,
            ToolName::LoadYamlMetadata => self.tool_load_yaml_metadata(args),
            ToolName::DryRunSql => self.tool_dry_run_sql(args, state, dynamic).await,
            ToolName::ExecuteSql => self.tool_execute_sql(args, dynamic).await,
            ToolName::SaveValidatedQuery => self.tool_save_validated_query(args).await,
        }
    }

    async fn tool_check_semantic_cache(&self, args: &Value, state: &TurnState) -> Value {
        let Some(question) = args.get("question").and_then(Value::as_str) else {
            return error_result("missing required field 'question'");
        };

        let allowed = state.resolved_exchange_datasets.as_ref().map(|(gold, silver)| vec![gold.clone(), silver.clone()]);

        match self
            .retrieval
            .probe_semantic_cache(question, self.config.semantic_cache_threshold, allowed.as_deref())
            .await
        {
            Ok(CacheOutcome::Hit(hit)) => json!({
                "status": "success",
                "cache_hit": true,
                "question": hit.question,
                "sql": hit.sql,
                "dataset": hit.dataset,
                "distance": hit.distance,
            }),
            Ok(CacheOutcome::Miss { reason }) => json!({"status": "success", "cache_hit": false, "reason": reason}),
            Err(err) => error_result(err.to_string()),
        }
    }

    fn tool_resolve_exchange(&self, args: &Value, state: &mut TurnState) -> Value {
        let Some(text) = args.get("text").and_then(Value::as_str) else {
            return error_result("missing required field 'text'");
        };

        match self.catalog.exchanges.resolve(text) {
            Some(entry) => {
                state.resolved_exchange_datasets = Some((entry.gold_dataset.clone(), entry.silver_dataset.clone()));
                json!({
                    "status": "success",
                    "resolved": true,
                    "gold_dataset": entry.gold_dataset,
                    "silver_dataset": entry.silver_dataset,
                })
            }
            None => json!({"status": "success", "resolved": false}),
        }
    }

    async fn tool_vector_search_columns(&self, args: &Value) -> Value {
        let Some(question) = args.get("question").and_then(Value::as_str) else {
            return error_result("missing required field 'question'");
        };

        match self.retrieval.search(question).await {
            Ok(result) => {
                cache_few_shot(&question_hash(question), result.examples.clone());
                json!({
                    "status": "success",
                    "used_table_fallback": result.used_table_fallback,
                    "tables": result.tables.iter().map(table_candidate_json).collect::<Vec<_>>(),
                    "glossary": result.glossary.iter().map(glossary_candidate_json).collect::<Vec<_>>(),
                })
            }
            Err(err) => error_result(err.to_string()),
        }
    }

    async fn tool_fetch_few_shot_examples(&self, args: &Value) -> Value {
        let Some(question) = args.get("question").and_then(Value::as_str) else {
            return error_result("missing required field 'question'");
        };

        let hash = question_hash(question);
        if let Some(cached) = get_cached_few_shot(&hash) {
            return json!({
                "status": "success",
                "source": "cache",
                "examples": cached.iter().map(example_candidate_json).collect::<Vec<_>>(),
            });
        }

        match self.retrieval.search(question).await {
            Ok(result) => {
                cache_few_shot(&hash, result.examples.clone());
                json!({
                    "status": "success",
                    "source": "search",
                    "examples": result.examples.iter().map(example_candidate_json).collect::<Vec<_>>(),
                })
            }
            Err(err) => error_result(err.to_string()),
        }
    }

    fn tool_load_yaml_metadata(&self, args: &Value) -> Value {
        let (Some(dataset), Some(table)) = (args.get("dataset").and_then(Value::as_str), args.get("table").and_then(Value::as_str)) else {
            return error_result("missing required fields 'dataset' and 'table'");
        };

        let question = args.get("question").and_then(Value::as_str).unwrap_or("");
        let hash = question_hash(question);

        if let Some(cached) = get_cached_metadata(&hash, dataset, table) {
            return json!({"status": "success", "source": "cache", "table": cached});
        }

        match self.catalog.table_with_dataset_context(dataset, table) {
            Some(view) => {
                let value = json!({
                    "table": view.table,
                    "dataset_context": view.dataset_context,
                });
                cache_metadata(&hash, dataset, table, value.clone());
                json!({"status": "success", "source": "catalog", "table": value})
            }
            None => error_result(format!("table not found: {dataset}.{table}")),
        }
    }

    async fn tool_dry_run_sql(&self, args: &Value, state: &mut TurnState, dynamic: &mut DynamicContext) -> Value {
        let Some(sql) = args.get("sql").and_then(Value::as_str) else {
            return error_result("missing required field 'sql'");
        };
        dynamic.sql_preview = Some(sql.to_string());

        match self.sql_pipeline.dry_run(sql).await {
            Ok(DryRunOutcome::Valid { estimated_bytes }) => {
                record_dry_run_outcome(state, true, self.config.dry_run_max_retries);
                json!({"status": "success", "valid": true, "estimated_bytes": estimated_bytes})
            }
            Ok(DryRunOutcome::Invalid { warehouse_message }) => {
                record_dry_run_outcome(state, false, self.config.dry_run_max_retries);
                json!({"status": "error", "valid": false, "error_message": warehouse_message})
            }
            Err(err) => error_result(err.to_string()),
        }
    }

    async fn tool_execute_sql(&self, args: &Value, dynamic: &mut DynamicContext) -> Value {
        let Some(sql) = args.get("sql").and_then(Value::as_str) else {
            return error_result("missing required field 'sql'");
        };
        dynamic.sql_preview = Some(sql.to_string());

        match self.sql_pipeline.execute(sql).await {
            Ok(outcome) => {
                let rows: Vec<Value> = outcome
                    .rows
                    .iter()
                    .map(|row| Value::Object(row.iter().map(|(key, value)| (key.clone(), value.clone())).collect()))
                    .collect();
                dynamic.row_preview_total = rows.len();
                dynamic.row_preview = rows.clone();

                let mut result = json!({
                    "status": "success",
                    "row_count": rows.len(),
                    "rows": rows,
                    "truncated": outcome.truncated,
                });
                if let Some(warning) = &outcome.warning {
                    result["warning"] = json!(warning);
                }
                result
            }
            Err(err) => error_result(err.to_string()),
        }
    }

    async fn tool_save_validated_query(&self, args: &Value) -> Value {
        let Some(question) = args.get("question").and_then(Value::as_str) else {
            return error_result("missing required field 'question'");
        };
        let Some(sql) = args.get("sql").and_then(Value::as_str) else {
            return error_result("missing required field 'sql'");
        };
        let Some(dataset) = args.get("dataset").and_then(Value::as_str) else {
            return error_result("missing required field 'dataset'");
        };
        let Some(validator) = args.get("validator").and_then(Value::as_str) else {
            return error_result("missing required field 'validator'");
        };

        let tables: Vec<String> = args
            .get("tables")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let complexity = args.get("complexity").and_then(Value::as_str).unwrap_or("simple").to_string();
        let routing_signal = args.get("routing_signal").and_then(Value::as_str).unwrap_or_default().to_string();

        let outcome = record_validated_query(
            self.query_memory_store.as_ref(),
            ValidatedQuery {
                question: question.to_string(),
                sql: sql.to_string(),
                tables,
                dataset: dataset.to_string(),
                complexity,
                routing_signal,
                validator: validator.to_string(),
            },
        )
        .await;

        match outcome {
            Ok(InsertOutcome::Success) => json!({"status": "success"}),
            Ok(InsertOutcome::PartialSuccess) => json!({
                "status": "partial_success",
                "note": "row inserted; its embedding will be generated on the next embedding refresh",
            }),
            Err(err) => error_result(err.to_string()),
        }
    }
}

fn error_result(message: impl Into<String>) -> Value {
    json!({"status": "error", "error_message": message.into()})
}

fn table_candidate_json(candidate: &TableCandidate) -> Value {
    json!({
        "dataset": candidate.dataset,
        "table": candidate.table,
        "min_distance": candidate.min_distance,
        "hit_count": candidate.hit_count,
        "columns": candidate.columns.iter().map(|c| json!({
            "column_name": c.column_name,
            "data_type": c.data_type,
            "description": c.description,
            "synonyms": c.synonyms,
            "category": c.category,
            "formula": c.formula,
            "example_values": c.example_values,
            "related_columns": c.related_columns,
            "typical_aggregation": c.typical_aggregation,
            "filterable": c.filterable,
            "distance": c.distance,
        })).collect::<Vec<_>>(),
    })
}

fn glossary_candidate_json(candidate: &GlossaryCandidate) -> Value {
    json!({
        "name": candidate.entry.name,
        "definition": candidate.entry.definition,
        "related_columns": candidate.entry.related_columns,
        "distance": candidate.distance,
    })
}

fn example_candidate_json(candidate: &ExampleCandidate) -> Value {
    json!({
        "question": candidate.example.question,
        "sql": candidate.example.sql,
        "tables": candidate.example.tables,
        "dataset": candidate.example.dataset,
        "distance": candidate.distance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nl2sql_core::{ChatCompletion, EmbeddingProvider, EmbeddingVector, TaskType, ToolCall, ToolDefinition};
    use nl2sql_retrieval::SearchWarehouse;
    use nl2sql_warehouse::{QueryResult, ValidatedQueryRow, Warehouse};
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubEmbeddingProvider;

    #[async_trait]
    impl EmbeddingProvider for StubEmbeddingProvider {
        async fn embed(&self, _text: &str, _task: TaskType) -> Nl2SqlResult<EmbeddingVector> {
            Ok(EmbeddingVector::new(vec![1.0, 0.0], "fake-model"))
        }

        async fn embed_batch(&self, texts: &[&str], task: TaskType) -> Nl2SqlResult<Vec<EmbeddingVector>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text, task).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> i32 {
            2
        }

        fn model_id(&self) -> &str {
            "fake-model"
        }
    }

    struct EmptySearchWarehouse;

    #[async_trait]
    impl SearchWarehouse for EmptySearchWarehouse {
        async fn combined_search(&self, _sql: &str) -> Nl2SqlResult<Vec<nl2sql_warehouse::Row>> {
            Ok(Vec::new())
        }

        async fn table_fallback_search(&self, _sql: &str) -> Nl2SqlResult<Vec<nl2sql_warehouse::Row>> {
            Ok(Vec::new())
        }

        async fn semantic_cache_probe(&self, _sql: &str) -> Nl2SqlResult<Option<nl2sql_warehouse::Row>> {
            Ok(None)
        }
    }

    struct StubWarehouse;

    #[async_trait]
    impl Warehouse for StubWarehouse {
        async fn dry_run(&self, _sql: &str) -> Nl2SqlResult<DryRunOutcome> {
            Ok(DryRunOutcome::Valid { estimated_bytes: 10 })
        }

        async fn execute(&self, _sql: &str, _row_cap: usize, _query_timeout: Duration, _fetch_timeout: Duration) -> Nl2SqlResult<QueryResult> {
            Ok(QueryResult { rows: Vec::new(), truncated: false })
        }

        fn project(&self) -> &str {
            "test-project"
        }
    }

    struct StubQueryMemoryStore {
        inserted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl QueryMemoryStore for StubQueryMemoryStore {
        async fn insert_validated(&self, row: ValidatedQueryRow) -> Nl2SqlResult<InsertOutcome> {
            self.inserted.lock().unwrap().push(row.question);
            Ok(InsertOutcome::Success)
        }
    }

    /// Answers with a canned sequence of completions: one `tool_calls`
    /// step (always `check_semantic_cache`), then a final text answer.
    struct ScriptedChatProvider {
        steps: Mutex<Vec<ChatCompletion>>,
    }

    #[async_trait]
    impl ChatProvider for ScriptedChatProvider {
        async fn complete(&self, _messages: &[ChatMessage], _tools: &[ToolDefinition]) -> Nl2SqlResult<ChatCompletion> {
            Ok(self.steps.lock().unwrap().remove(0))
        }

        fn model_id(&self) -> &str {
            "scripted"
        }
    }

    fn test_agent(chat_provider: Arc<dyn ChatProvider>) -> Agent {
        let catalog = Arc::new(Catalog::default());
        let retrieval = Arc::new(RetrievalEngine::new(
            Arc::new(EmptySearchWarehouse),
            Arc::new(StubEmbeddingProvider),
            "test-project",
            "metadata",
            Default::default(),
        ));
        let sql_pipeline = Arc::new(SqlPipeline::new(Arc::new(StubWarehouse), 1000, Duration::from_secs(30), Duration::from_secs(120)));
        let query_memory_store: Arc<dyn QueryMemoryStore> = Arc::new(StubQueryMemoryStore { inserted: Mutex::new(Vec::new()) });
        Agent::new(AgentConfig::with_defaults_for_tests(), catalog, retrieval, sql_pipeline, chat_provider, query_memory_store)
    }

    #[tokio::test]
    async fn final_answer_with_no_tool_calls_returns_immediately() {
        let provider = Arc::new(ScriptedChatProvider {
            steps: Mutex::new(vec![ChatCompletion {
                content: Some("there were no trades yesterday".to_string()),
                tool_calls: Vec::new(),
            }]),
        });
        let agent = test_agent(provider);
        let answer = agent.ask("how many trades yesterday?").await.unwrap();
        assert_eq!(answer, "there were no trades yesterday");
    }

    #[tokio::test]
    async fn check_semantic_cache_miss_then_final_answer_runs_the_tool_loop_once() {
        let provider = Arc::new(ScriptedChatProvider {
            steps: Mutex::new(vec![
                ChatCompletion {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "call-1".to_string(),
                        name: "check_semantic_cache".to_string(),
                        arguments: json!({"question": "how many trades yesterday?"}),
                    }],
                },
                ChatCompletion {
                    content: Some("no cached answer; here's the computed result".to_string()),
                    tool_calls: Vec::new(),
                },
            ]),
        });
        let agent = test_agent(provider);
        let answer = agent.ask("how many trades yesterday?").await.unwrap();
        assert_eq!(answer, "no cached answer; here's the computed result");
    }

    #[tokio::test]
    async fn unknown_tool_name_reports_an_error_without_panicking() {
        let provider = Arc::new(ScriptedChatProvider {
            steps: Mutex::new(vec![
                ChatCompletion {
                    content: None,
                    tool_calls: vec![ToolCall {
                        id: "call-1".to_string(),
                        name: "delete_everything".to_string(),
                        arguments: json!({}),
                    }],
                },
                ChatCompletion {
                    content: Some("ok".to_string()),
                    tool_calls: Vec::new(),
                },
            ]),
        });
        let agent = test_agent(provider);
        let answer = agent.ask("anything").await.unwrap();
        assert_eq!(answer, "ok");
    }
}
