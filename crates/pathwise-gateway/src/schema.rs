//! GraphQL schema served in front of the gateway.
//!
//! The transport lives outside this crate; resolvers in
//! [`Gateway`](crate::Gateway) map one-to-one onto these fields.

/// SDL for the whole gateway surface.
pub const SCHEMA_SDL: &str = r#"scalar JSON

type Artifact {
  name: String!
  path: String!
  contentType: String
}

type Job {
  id: ID!
  kind: String!
  status: String!
  createdAt: String!
  updatedAt: String!
  config: JSON!
  metrics: JSON
  artifacts: [Artifact!]!
  error: String
}

type Query {
  hjbJob(id: ID!): Job
  sbJob(id: ID!): Job
  diffJob(id: ID!): Job
}

type Mutation {
  hjbSolvePDE(config: JSON!): Job!
  hjbSolveMDP(config: JSON!): Job!
  hjbRollout(jobId: ID!, start: [Float!]!, steps: Int, dt: Float): Artifact!
  sbRun(
    mu: String!
    nu: String!
    eps: Float!
    iters: Int = 500
    tol: Float = 1e-3
    cost: String = "l2"
  ): Job!
  sbFrames(jobId: ID!, t: [Float!]!): [Artifact!]!
  diffusionRunFP(config: JSON!): Job!
  diffusionRunSDE(config: JSON!): Job!
}

type Subscription {
  hjbEvents(jobId: ID): Job!
  sbEvents(jobId: ID): Job!
  diffEvents(jobId: ID): Job!
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_resolver_is_declared() {
        for field in [
            "hjbJob(id: ID!): Job",
            "sbJob(id: ID!): Job",
            "diffJob(id: ID!): Job",
            "hjbSolvePDE(config: JSON!): Job!",
            "hjbSolveMDP(config: JSON!): Job!",
            "hjbRollout(jobId: ID!",
            "sbRun(\n    mu: String!",
            "sbFrames(jobId: ID!, t: [Float!]!): [Artifact!]!",
            "diffusionRunFP(config: JSON!): Job!",
            "diffusionRunSDE(config: JSON!): Job!",
            "hjbEvents(jobId: ID): Job!",
            "sbEvents(jobId: ID): Job!",
            "diffEvents(jobId: ID): Job!",
        ] {
            assert!(SCHEMA_SDL.contains(field), "missing {field}");
        }
    }

    #[test]
    fn braces_balance() {
        let open = SCHEMA_SDL.matches('{').count();
        let close = SCHEMA_SDL.matches('}').count();
        assert_eq!(open, close);
        assert_eq!(open, 6);
    }
}
