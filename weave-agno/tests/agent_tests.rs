//! Contract tests for agent and team resources

use serde_json::json;
use weave_agno::{
    Agent, AgentConfig, AgentOutputs, AgentSpec, AnthropicModelConfig, McpTransport, ModelOutputs,
    ModelProvider, ModelRef, ModelSpec, OpenAiModelConfig, PromptConfig, Team, TeamConfig,
    ToolOutputs, ToolRef, ToolSpec, ToolsMcpConfig, ToolsWebSearchConfig,
};
use weave_gcp::TokenSource;
use weave_kubernetes::K8sClient;
use weave_resource::{Dependency, FieldValue, Resource, ResourceError};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_model_dep() -> Dependency<weave_agno::OpenAiModel> {
    let config = OpenAiModelConfig {
        api_key: FieldValue::literal("sk-test".to_string()),
        id: "gpt-4o".to_string(),
        max_tokens: None,
        temperature: Some(0.3),
    };
    let outputs = ModelOutputs {
        spec: ModelSpec {
            provider: ModelProvider::OpenAi,
            id: "gpt-4o".to_string(),
            api_key: "sk-test".to_string(),
            max_tokens: None,
            temperature: Some(0.3),
        },
        ready: true,
    };

    Dependency::resolved("agno/model/openai:writer-model", config, Some(outputs))
}

fn websearch_dep() -> Dependency<weave_agno::ToolsWebSearch> {
    Dependency::resolved(
        "agno/tools/websearch:search",
        ToolsWebSearchConfig { max_results: 3 },
        Some(ToolOutputs {
            spec: ToolSpec::Websearch { max_results: 3 },
        }),
    )
}

fn prompt_dep() -> Dependency<weave_agno::Prompt> {
    let config = PromptConfig {
        instructions: vec!["Be helpful.".to_string()],
        variables: Default::default(),
        template: None,
    };

    Dependency::resolved("agno/prompt:base-prompt", config, None)
}

fn agent_config() -> AgentConfig {
    AgentConfig {
        cluster: Dependency::declared("gcp/gke:prod-cluster"),
        model: ModelRef::OpenAi(openai_model_dep()),
        tools: vec![ToolRef::Websearch(websearch_dep())],
        prompt: None,
        instructions: Some("Answer briefly.".to_string()),
        image: "ghcr.io/agno-agi/agno:latest".to_string(),
        replicas: 1,
    }
}

fn kube(server: &MockServer) -> K8sClient {
    K8sClient::new(server.uri(), TokenSource::fixed("test-token")).unwrap()
}

fn not_found() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "kind": "Status",
        "status": "Failure",
        "message": "not found",
        "reason": "NotFound",
        "code": 404
    }))
}

#[test]
fn spec_assembles_model_tools_and_instructions() {
    let agent = Agent::new("researcher", agent_config());
    let spec = agent.build_spec().unwrap();

    assert_eq!(spec.name, "researcher");
    assert_eq!(spec.instructions.as_deref(), Some("Answer briefly."));
    assert_eq!(spec.model.provider, ModelProvider::OpenAi);
    assert_eq!(spec.model.id, "gpt-4o");
    assert_eq!(spec.tools, vec![ToolSpec::Websearch { max_results: 3 }]);
}

#[test]
fn prompt_dependency_overrides_literal_instructions() {
    let mut config = agent_config();
    config.prompt = Some(prompt_dep());

    let agent = Agent::new("researcher", config);
    let spec = agent.build_spec().unwrap();

    assert_eq!(spec.instructions.as_deref(), Some("Be helpful."));
}

#[test]
fn spec_fails_when_model_dependency_is_unresolved() {
    let mut config = agent_config();
    config.model = ModelRef::Anthropic(Dependency::declared("agno/model/anthropic:reasoner"));

    let agent = Agent::new("researcher", config);
    let err = agent.build_spec().unwrap_err();

    assert!(matches!(err, ResourceError::UnresolvedDependency(_)));
}

#[test]
fn mcp_tool_spec_flows_through() {
    let mcp = Dependency::resolved(
        "agno/tools/mcp:docs-mcp",
        ToolsMcpConfig {
            url: "https://mcp.example.com/sse".to_string(),
            transport: McpTransport::Sse,
        },
        Some(ToolOutputs {
            spec: ToolSpec::Mcp {
                url: "https://mcp.example.com/sse".to_string(),
                transport: McpTransport::Sse,
            },
        }),
    );

    let mut config = agent_config();
    config.tools = vec![ToolRef::Mcp(mcp)];

    let agent = Agent::new("researcher", config);
    let spec = agent.build_spec().unwrap();

    assert!(matches!(spec.tools[0], ToolSpec::Mcp { .. }));
}

#[tokio::test]
async fn create_deploys_workload_and_reports_in_cluster_url() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/apis/apps/v1/namespaces/default/deployments/agno-researcher"))
        .respond_with(not_found())
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // The deployment carries the serialized agent spec in its env.
    Mock::given(method("POST"))
        .and(path("/apis/apps/v1/namespaces/default/deployments"))
        .and(body_partial_json(json!({
            "metadata": {"name": "agno-researcher"},
            "spec": {"template": {"spec": {"containers": [{"name": "agent"}]}}}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "kind": "Deployment",
            "metadata": {"name": "agno-researcher"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/apis/apps/v1/namespaces/default/deployments/agno-researcher"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Deployment",
            "metadata": {"name": "agno-researcher"},
            "status": {"readyReplicas": 1}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/namespaces/default/services/agno-researcher"))
        .respond_with(not_found())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/namespaces/default/services"))
        .and(body_partial_json(json!({
            "metadata": {"name": "agno-researcher"},
            "spec": {"type": "ClusterIP"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "kind": "Service",
            "metadata": {"name": "agno-researcher"},
            "spec": {"clusterIP": "10.0.0.30"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = Agent::new("researcher", agent_config()).with_kube_client(kube(&server));
    let outputs = agent.on_create().await.unwrap();

    assert_eq!(outputs.url, "http://agno-researcher.default.svc.cluster.local");
    assert_eq!(outputs.spec.model.id, "gpt-4o");
}

#[tokio::test]
async fn update_with_unchanged_config_returns_cached_outputs() {
    let agent = Agent::new("researcher", agent_config());
    let cached = AgentOutputs {
        spec: agent.build_spec().unwrap(),
        url: "http://agno-researcher.default.svc.cluster.local".to_string(),
    };

    let agent = Agent::new("researcher", agent_config()).with_outputs(cached.clone());
    let outputs = agent.on_update(&agent_config()).await.unwrap();

    assert_eq!(outputs, cached);
}

#[tokio::test]
async fn update_rejects_cluster_change() {
    let mut previous = agent_config();
    previous.cluster = Dependency::declared("gcp/gke:other-cluster");

    let agent = Agent::new("researcher", agent_config());
    let err = agent.on_update(&previous).await.unwrap_err();

    assert!(matches!(err, ResourceError::Immutable("cluster")));
}

#[tokio::test]
async fn delete_removes_children_and_is_idempotent() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/v1/namespaces/default/services/agno-researcher"))
        .respond_with(not_found())
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/apis/apps/v1/namespaces/default/deployments/agno-researcher"))
        .respond_with(not_found())
        .mount(&server)
        .await;

    let agent = Agent::new("researcher", agent_config()).with_kube_client(kube(&server));
    agent.on_delete().await.unwrap();
}

fn agent_dep(spec: AgentSpec) -> Dependency<Agent> {
    Dependency::resolved(
        format!("agno/agent:{}", spec.name),
        agent_config(),
        Some(AgentOutputs {
            url: format!("http://agno-{}.default.svc.cluster.local", spec.name),
            spec,
        }),
    )
}

#[test]
fn team_spec_embeds_member_specs() {
    let researcher = Agent::new("researcher", agent_config()).build_spec().unwrap();
    let writer = Agent::new("writer", agent_config()).build_spec().unwrap();

    let config = TeamConfig {
        cluster: Dependency::declared("gcp/gke:prod-cluster"),
        model: ModelRef::OpenAi(openai_model_dep()),
        members: vec![agent_dep(researcher), agent_dep(writer)],
        instructions: Some("Route questions to the right member.".to_string()),
        image: "ghcr.io/agno-agi/agno:latest".to_string(),
        replicas: 1,
    };

    let team = Team::new("newsroom", config);
    let spec = team.build_spec().unwrap();

    assert_eq!(spec.name, "newsroom");
    assert_eq!(spec.member_specs.len(), 2);
    assert_eq!(spec.member_specs[1].name, "writer");
}

#[test]
fn team_requires_at_least_one_member() {
    let config = TeamConfig {
        cluster: Dependency::declared("gcp/gke:prod-cluster"),
        model: ModelRef::OpenAi(openai_model_dep()),
        members: vec![],
        instructions: None,
        image: "ghcr.io/agno-agi/agno:latest".to_string(),
        replicas: 1,
    };

    let team = Team::new("newsroom", config);
    let err = team.build_spec().unwrap_err();

    assert!(matches!(err, ResourceError::Validation(_)));
}

#[test]
fn anthropic_model_ref_resolves_spec() {
    let config = AnthropicModelConfig {
        api_key: FieldValue::literal("sk-ant".to_string()),
        id: "claude-sonnet-4-20250514".to_string(),
        max_tokens: Some(2048),
        temperature: None,
    };
    let outputs = ModelOutputs {
        spec: ModelSpec {
            provider: ModelProvider::Anthropic,
            id: "claude-sonnet-4-20250514".to_string(),
            api_key: "sk-ant".to_string(),
            max_tokens: Some(2048),
            temperature: None,
        },
        ready: true,
    };

    let mut agent_config = agent_config();
    agent_config.model = ModelRef::Anthropic(Dependency::resolved(
        "agno/model/anthropic:reasoner",
        config,
        Some(outputs),
    ));

    let agent = Agent::new("researcher", agent_config);
    let spec = agent.build_spec().unwrap();

    assert_eq!(spec.model.provider, ModelProvider::Anthropic);
    assert_eq!(spec.model.max_tokens, Some(2048));
}
