//! Question → query plan.

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::llm::{GenerateRequest, LLMClient};
use crate::plan::QueryPlan;
use crate::schema::SchemaProvider;
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a query decomposition specialist focused on \
converting natural language questions into graph database queries.
Your task is to analyze a question about a taxonomy and break it down into specific graph \
queries that can retrieve the relevant information.
You will identify entities, relationships, and constraints in the question and translate them \
into appropriate Cypher queries for Neo4j.";

/// Build the user prompt for one question.
pub fn build_prompt(question: &str, schema_text: &str) -> String {
    format!(
        "{schema_text}\n\n\
QUESTION:\n{question}\n\n\
Break the question into one or more Cypher queries against the schema above.\n\
Name relationship variables you filter on, bound variable-length paths, and \
join separate MATCH clauses with a WHERE condition.\n\
Respond with a JSON object of the form:\n\
{{\"thought_process\": \"...\", \"query_plan\": [{{\"purpose\": \"...\", \"cypher\": \"...\"}}]}}"
    )
}

pub struct QueryDecompositionAgent {
    llm: Arc<dyn LLMClient>,
    schema: Arc<dyn SchemaProvider>,
    system_prompt: String,
    temperature: f32,
}

impl QueryDecompositionAgent {
    pub fn new(
        llm: Arc<dyn LLMClient>,
        schema: Arc<dyn SchemaProvider>,
        config: &AgentConfig,
    ) -> Self {
        Self {
            llm,
            schema,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: config.llm_temperature,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub async fn decompose(&self, question: &str) -> Result<QueryPlan, AgentError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentError::EmptyQuestion);
        }

        let schema = self.schema.get_schema(false).await?;
        let prompt = build_prompt(question, &schema.to_prompt_text());

        info!(model = self.llm.model_name(), "decomposing question");
        let response = self
            .llm
            .generate(
                GenerateRequest::new(&prompt)
                    .system(&self.system_prompt)
                    .temperature(self.temperature),
            )
            .await?;

        let plan = QueryPlan::from_llm_json(response)
            .map_err(|e| AgentError::InvalidPlan(e.to_string()))?;
        info!(queries = plan.query_plan.len(), "decomposition complete");
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLLMClient;
    use crate::schema::{GraphSchema, StaticSchemaProvider};
    use std::collections::BTreeMap;

    fn agent(mock: Arc<MockLLMClient>) -> QueryDecompositionAgent {
        let schema = GraphSchema {
            node_types: BTreeMap::from([("Person".to_string(), vec!["name".to_string()])]),
            ..GraphSchema::default()
        };
        QueryDecompositionAgent::new(
            mock,
            Arc::new(StaticSchemaProvider::new(schema)),
            &AgentConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_decompose_parses_plan_and_embeds_schema() {
        let mock = Arc::new(MockLLMClient::always(
            r#"{"thought_process": "people", "query_plan": [{"purpose": "p", "cypher": "MATCH (p:Person) RETURN p"}]}"#,
        ));
        let plan = agent(mock.clone()).decompose("Who is here?").await.unwrap();

        assert_eq!(plan.query_plan.len(), 1);
        let prompt = &mock.prompts()[0];
        assert!(prompt.contains("- Person (Count: 0)"));
        assert!(prompt.contains("Who is here?"));
        assert_eq!(
            mock.system_prompts(),
            vec![Some(DEFAULT_SYSTEM_PROMPT.to_string())]
        );
    }

    #[tokio::test]
    async fn test_custom_system_prompt_is_sent() {
        let mock = Arc::new(MockLLMClient::always(r#"{"query_plan": []}"#));
        agent(mock.clone())
            .with_system_prompt("Answer in Cypher only.")
            .decompose("anything")
            .await
            .unwrap();
        assert_eq!(
            mock.system_prompts(),
            vec![Some("Answer in Cypher only.".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_question_rejected_without_calling_llm() {
        let mock = Arc::new(MockLLMClient::always("{}"));
        let err = agent(mock.clone()).decompose("   ").await.unwrap_err();
        assert!(matches!(err, AgentError::EmptyQuestion));
        assert!(mock.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_plan_is_reported() {
        let mock = Arc::new(MockLLMClient::always(r#"{"query_plan": "not a list"}"#));
        let err = agent(mock).decompose("anything").await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidPlan(_)));
    }
}
