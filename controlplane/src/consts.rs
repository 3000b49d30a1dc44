// The namespace the operator runs in and manages its resources in.
pub const NODE_OBSERVABILITY_NAMESPACE: &str = "node-observability-operator";

// Name shared by the agent pods, their Service and the serving certificate Secret.
pub const AGENT_NAME: &str = "node-observability-agent";

// Port exposed by the agent Service.
pub const AGENT_SERVICE_PORT: i32 = 8443;

// Port the agent pods listen on.
pub const AGENT_TARGET_PORT: i32 = AGENT_SERVICE_PORT;

// Annotation asking the service-ca operator to mint a serving certificate into the named Secret.
pub const INJECT_CERTS_ANNOTATION: &str = "service.beta.openshift.io/serving-cert-secret-name";

// Label identifying the NodeObservability a resource belongs to; also used as Service selector.
pub const NODE_OBSERVABILITY_LABEL: &str = "nodeobs_cr";

// Service type of the agent Service.
pub const SERVICE_TYPE_CLUSTER_IP: &str = "ClusterIP";

// ClusterIP value marking a headless Service.
pub const CLUSTER_IP_NONE: &str = "None";

pub const PROTOCOL_TCP: &str = "TCP";

// Default resync period of a healthy NodeObservability.
pub const DEFAULT_REQUEUE_SECS: u64 = 300;

// Default delay before retrying a failed reconciliation.
pub const DEFAULT_ERROR_REQUEUE_SECS: u64 = 5;
