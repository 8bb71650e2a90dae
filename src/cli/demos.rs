//! Demo pipelines
//!
//! Small pipelines showing each composition pattern. Every demo ships a
//! scripted model so it runs offline; with the Ollama provider the same
//! pipeline runs against a real model instead.

use clap::ValueEnum;
use serde_json::{json, Value};

use crate::agent::{
    fn_agent, Composer, LlmAgent, LoopAgent, LoopControl, ParallelAgent, Pipeline, SequentialAgent,
};
use crate::core::{ConductorError, Result, Session};
use crate::llm::{ModelContext, ModelResponse, ScriptedModel};
use crate::tools::{tool_fn, tool_fn_with_session};

/// Which demo to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DemoKind {
    /// Extract facts, then clean them
    Sequential,
    /// Weather and news lookups side by side
    Parallel,
    /// Number guessing until the checker agrees
    Loop,
    /// Supervisor delegating to a specialist agent exposed as a tool
    Nested,
    /// Parallel research merged into one report
    Research,
    /// Writer and critic refining a draft
    Refiner,
    /// Email agent behind a schema-checked tool with safety rules
    Safety,
}

/// A runnable demo
pub struct Demo {
    /// The validated pipeline
    pub pipeline: Pipeline,
    /// Offline model answering for every LLM agent in the pipeline
    pub script: ScriptedModel,
    /// Input used when none is given
    pub default_input: Value,
}

/// Build the demo of the given kind
pub fn build(kind: DemoKind) -> Result<Demo> {
    match kind {
        DemoKind::Sequential => sequential(),
        DemoKind::Parallel => parallel(),
        DemoKind::Loop => guessing_loop(),
        DemoKind::Nested => nested(),
        DemoKind::Research => research(),
        DemoKind::Refiner => refiner(),
        DemoKind::Safety => safety(),
    }
}

fn input_text(ctx: &ModelContext) -> String {
    match &ctx.input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sequential() -> Result<Demo> {
    let extractor = LlmAgent::builder("extractor")
        .instruction(
            "Extract the individual facts from the text below. \
             Reply with JSON {\"facts\": [..]}.\n\n{input}",
        )
        .build()?
        .shared();

    let cleaner = fn_agent("cleaner", |input, _| {
        let facts = input["facts"]
            .as_array()
            .ok_or_else(|| ConductorError::Other("expected a list of facts".to_string()))?;
        let mut clean: Vec<String> = Vec::new();
        for fact in facts.iter().filter_map(Value::as_str) {
            let fact = fact.trim().trim_end_matches('.').to_string();
            if !fact.is_empty() && !clean.contains(&fact) {
                clean.push(fact);
            }
        }
        Ok(json!({ "clean_facts": clean }))
    })?
    .shared();

    let root = SequentialAgent::builder("extract_and_clean")
        .agent(extractor)
        .agent(cleaner)
        .build()?
        .shared();

    let script = ScriptedModel::new().on("extractor", |_, ctx| {
        let facts: Vec<String> = input_text(ctx)
            .split('.')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(ModelResponse::json(json!({ "facts": facts })))
    });

    Ok(Demo {
        pipeline: Composer::new().build(root)?,
        script,
        default_input: json!("Rust is fast. Rust is safe. Rust is fast."),
    })
}

fn parallel() -> Result<Demo> {
    let mut composer = Composer::new();
    composer.register_tool(
        "get_weather",
        json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }),
        json!({"type": "object", "required": ["forecast"]}),
        tool_fn(|args| {
            let city = args["city"].as_str().unwrap_or_default();
            Ok(json!({ "city": city, "forecast": "sunny", "high_c": 24 }))
        }),
    )?;
    composer.register_tool(
        "get_news",
        json!({
            "type": "object",
            "properties": {"city": {"type": "string"}},
            "required": ["city"]
        }),
        json!({"type": "array", "items": {"type": "string"}}),
        tool_fn(|args| {
            let city = args["city"].as_str().unwrap_or_default();
            Ok(json!([
                format!("{} opens a new riverside park", city),
                format!("Transit upgrades announced for {}", city)
            ]))
        }),
    )?;

    let weather = LlmAgent::builder("weather")
        .instruction("Look up the weather for {input} with get_weather and report it.")
        .tool("get_weather")
        .build()?
        .with_output_key("weather")
        .shared();
    let news = LlmAgent::builder("news")
        .instruction("Look up today's headlines for {input} with get_news and list them.")
        .tool("get_news")
        .build()?
        .with_output_key("news")
        .shared();

    let root = ParallelAgent::builder("city_briefing")
        .agent(weather)
        .agent(news)
        .build()?
        .shared();

    let script = ScriptedModel::new()
        .tool_then_echo("weather", "get_weather", |ctx| json!({ "city": input_text(ctx) }))
        .tool_then_echo("news", "get_news", |ctx| json!({ "city": input_text(ctx) }));

    Ok(Demo {
        pipeline: composer.build(root)?,
        script,
        default_input: json!("Lisbon"),
    })
}

fn guessing_loop() -> Result<Demo> {
    let setup = fn_agent("setup", |input, _| {
        let target = input
            .as_i64()
            .or_else(|| input.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| ConductorError::Other("target must be a number".to_string()))?;
        Ok(json!({ "target": target, "low": 1, "high": 100 }))
    })?
    .shared();

    let guesser = LlmAgent::builder("guesser")
        .instruction(
            "Guess a whole number between {low} and {high}. \
             Reply with JSON {\"guess\": n}.",
        )
        .build()?
        .shared();

    let checker = fn_agent("checker", |input, session| {
        let guess = input["guess"]
            .as_i64()
            .ok_or_else(|| ConductorError::Other("guess must be a number".to_string()))?;
        let target = session.get_i64("target").unwrap_or_default();
        let (low, high) = (
            session.get_i64("low").unwrap_or(1),
            session.get_i64("high").unwrap_or(100),
        );
        let result = match guess.cmp(&target) {
            std::cmp::Ordering::Equal => json!({ "status": "correct", "guess": guess }),
            std::cmp::Ordering::Less => {
                json!({ "status": "too_low", "low": (guess + 1).min(high), "guess": guess })
            }
            std::cmp::Ordering::Greater => {
                json!({ "status": "too_high", "high": (guess - 1).max(low), "guess": guess })
            }
        };
        Ok(result)
    })?
    .shared();

    let round = SequentialAgent::builder("round")
        .agent(guesser)
        .agent(checker)
        .build()?
        .shared();
    let rounds = LoopAgent::builder("guessing", round)
        .max_iterations(10)
        .until(|state| LoopControl::stop_if(state.session.get_str("status") == Some("correct")))
        .build()?
        .shared();

    let root = SequentialAgent::builder("guessing_game")
        .agent(setup)
        .agent(rounds)
        .build()?
        .shared();

    let script = ScriptedModel::new().on("guesser", |_, ctx| {
        let low = ctx.session["low"].as_i64().unwrap_or(1);
        let high = ctx.session["high"].as_i64().unwrap_or(100);
        Ok(ModelResponse::json(json!({ "guess": (low + high) / 2 })))
    });

    Ok(Demo {
        pipeline: Composer::new().build(root)?,
        script,
        default_input: json!(42),
    })
}

fn parse_addends(text: &str) -> Vec<f64> {
    text.split(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .filter_map(|part| part.parse().ok())
        .collect()
}

fn nested() -> Result<Demo> {
    let mut composer = Composer::new();
    composer.register_tool(
        "add",
        json!({
            "type": "object",
            "properties": {"numbers": {"type": "array", "items": {"type": "number"}}},
            "required": ["numbers"],
            "additionalProperties": false
        }),
        json!({"type": "number"}),
        tool_fn(|args| {
            let sum: f64 = args["numbers"]
                .as_array()
                .map(|items| items.iter().filter_map(Value::as_f64).sum())
                .unwrap_or_default();
            Ok(json!(sum))
        }),
    )?;

    let specialist = LlmAgent::builder("math_specialist")
        .instruction("Solve this arithmetic request using the add tool: {input}")
        .tool("add")
        .build()?
        .with_description("Solves arithmetic questions")
        .with_output_key("math_answer")
        .shared();
    composer.register_agent_tool("ask_math_specialist", specialist)?;

    let supervisor = LlmAgent::builder("supervisor")
        .instruction(
            "You route questions. Delegate arithmetic to ask_math_specialist \
             and report its answer.\n\nQuestion: {input}",
        )
        .tool("ask_math_specialist")
        .build()?
        .shared();

    let script = ScriptedModel::new()
        .tool_then_echo("supervisor", "ask_math_specialist", |ctx| {
            json!({ "request": input_text(ctx) })
        })
        .tool_then_echo("math_specialist", "add", |ctx| {
            json!({ "numbers": parse_addends(&input_text(ctx)) })
        });

    Ok(Demo {
        pipeline: composer.build(supervisor)?,
        script,
        default_input: json!("What is 2 + 3 + 4.5?"),
    })
}

fn research() -> Result<Demo> {
    let tech = LlmAgent::builder("tech_researcher")
        .instruction("Summarize the technical state of {input} in two sentences.")
        .build()?
        .with_output_key("tech_findings")
        .shared();
    let market = LlmAgent::builder("market_researcher")
        .instruction("Summarize the market outlook for {input} in two sentences.")
        .build()?
        .with_output_key("market_findings")
        .shared();

    let research = ParallelAgent::builder("research")
        .agent(tech)
        .agent(market)
        .build()?
        .shared();

    let merger = LlmAgent::builder("merger")
        .instruction(
            "Write a short report from these findings.\n\
             Technical: {tech_findings}\nMarket: {market_findings}\n\
             Reply with JSON {\"report\": \"..\"}.",
        )
        .build()?
        .with_output_key("report")
        .shared();

    let root = SequentialAgent::builder("research_pipeline")
        .agent(research)
        .agent(merger)
        .build()?
        .shared();

    let script = ScriptedModel::new()
        .on("tech_researcher", |_, ctx| {
            Ok(ModelResponse::text(format!(
                "{} tooling has matured quickly.",
                input_text(ctx)
            )))
        })
        .on("market_researcher", |_, ctx| {
            Ok(ModelResponse::text(format!(
                "Adoption of {} keeps growing.",
                input_text(ctx)
            )))
        })
        .on("merger", |_, ctx| {
            let tech = ctx.session["tech_findings"].as_str().unwrap_or_default();
            let market = ctx.session["market_findings"].as_str().unwrap_or_default();
            Ok(ModelResponse::json(json!({ "report": format!("{} {}", tech, market) })))
        });

    Ok(Demo {
        pipeline: Composer::new().build(root)?,
        script,
        default_input: json!("WebAssembly"),
    })
}

const APPROVAL_WORDS: usize = 20;

fn word_count(session: &Session) -> usize {
    session
        .get_str("draft")
        .map(|d| d.split_whitespace().count())
        .unwrap_or_default()
}

fn refiner() -> Result<Demo> {
    let writer = LlmAgent::builder("writer")
        .instruction("Write a first draft of a short paragraph about {input}.")
        .build()?
        .with_output_key("draft")
        .shared();

    let reviser = LlmAgent::builder("reviser")
        .instruction(
            "Improve this draft.\n\nDraft: {draft}\nFeedback: {feedback?}\n\
             Reply with the revised draft only.",
        )
        .build()?
        .with_output_key("draft")
        .shared();

    let critic = fn_agent("critic", |_, session| {
        let words = word_count(session);
        if words >= APPROVAL_WORDS {
            Ok(json!({ "verdict": "approved", "feedback": "" }))
        } else {
            Ok(json!({
                "verdict": "revise",
                "feedback": format!("Add detail: {} of {} words", words, APPROVAL_WORDS)
            }))
        }
    })?
    .shared();

    let round = SequentialAgent::builder("revision_round")
        .agent(reviser)
        .agent(critic)
        .build()?
        .shared();
    let refine = LoopAgent::builder("refine", round)
        .max_iterations(5)
        .until_session_eq("verdict", json!("approved"))
        .build()?
        .shared();

    let publish = fn_agent("publisher", |_, session| {
        Ok(json!({
            "article": session.get_str("draft").unwrap_or_default(),
            "words": word_count(session)
        }))
    })?
    .shared();

    let root = SequentialAgent::builder("content_refiner")
        .agent(writer)
        .agent(refine)
        .agent(publish)
        .build()?
        .shared();

    let script = ScriptedModel::new()
        .on("writer", |_, ctx| {
            Ok(ModelResponse::text(format!("{} is worth learning.", input_text(ctx))))
        })
        .on("reviser", |_, ctx| {
            let draft = ctx.session["draft"].as_str().unwrap_or_default();
            Ok(ModelResponse::text(format!(
                "{} It rewards careful study with lasting, practical skills.",
                draft
            )))
        });

    Ok(Demo {
        pipeline: Composer::new().build(root)?,
        script,
        default_input: json!("Rust"),
    })
}

const ALLOWED_DOMAINS: [&str; 2] = ["mycompany.com", "partner.org"];
const SENSITIVE_TERMS: [&str; 4] = ["password", "ssn", "secret", "confidential"];

/// Reason an email may not be sent, if any
fn email_violation(to: &str, body: &str) -> Option<String> {
    let well_formed = to
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !well_formed {
        return Some("Invalid email format".to_string());
    }
    if !ALLOWED_DOMAINS
        .iter()
        .any(|domain| to.ends_with(&format!("@{}", domain)))
    {
        return Some(format!(
            "Can only send to these domains: {}",
            ALLOWED_DOMAINS.join(", ")
        ));
    }
    let body = body.to_lowercase();
    SENSITIVE_TERMS
        .iter()
        .find(|term| body.contains(*term))
        .map(|term| format!("Cannot send emails containing sensitive terms: {}", term))
}

fn safety() -> Result<Demo> {
    let mut composer = Composer::new();
    composer.register_tool(
        "send_email",
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string"},
                "subject": {"type": "string"},
                "body": {"type": "string"}
            },
            "required": ["to", "subject", "body"],
            "additionalProperties": false
        }),
        json!({
            "type": "object",
            "properties": {"status": {"enum": ["success", "error"]}},
            "required": ["status"]
        }),
        tool_fn_with_session(|args, session| {
            let to = args["to"].as_str().unwrap_or_default();
            let body = args["body"].as_str().unwrap_or_default();
            if let Some(message) = email_violation(to, body) {
                tracing::warn!(to, %message, "email blocked");
                return Ok(json!({ "status": "error", "message": message }));
            }
            let sent = session.get_i64("emails_sent").unwrap_or(0) + 1;
            session.set("emails_sent", json!(sent));
            let preview: String = body.chars().take(30).collect();
            Ok(json!({
                "status": "success",
                "to": to,
                "subject": args["subject"],
                "body_preview": preview
            }))
        }),
    )?;

    let email_agent = LlmAgent::builder("email_agent")
        .instruction(
            "Send the email described below with send_email and report the result.\n\n{input}",
        )
        .tool("send_email")
        .catch_tool_errors(true)
        .build()?
        .with_description("An agent that can send emails with safety checks")
        .with_output_key("email_result")
        .shared();

    let script = ScriptedModel::new()
        .tool_then_echo("email_agent", "send_email", |ctx| ctx.input.clone());

    Ok(Demo {
        pipeline: composer.build(email_agent)?,
        script,
        default_input: json!({
            "to": "user@mycompany.com",
            "subject": "Meeting Today",
            "body": "Let's discuss the project progress."
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_demo_builds() {
        for kind in DemoKind::value_variants() {
            assert!(build(*kind).is_ok(), "{:?} failed to build", kind);
        }
    }

    #[test]
    fn test_email_violations() {
        assert_eq!(email_violation("user@mycompany.com", "Lunch at noon"), None);
        assert_eq!(
            email_violation("invalid-email", "Hello").as_deref(),
            Some("Invalid email format")
        );
        assert!(email_violation("user@external.com", "Hello")
            .unwrap()
            .starts_with("Can only send to"));
        assert!(email_violation("user@partner.org", "Your PASSWORD is Admin123")
            .unwrap()
            .ends_with("password"));
    }

    #[test]
    fn test_parse_addends() {
        assert_eq!(parse_addends("What is 2 + 3 + 4.5?"), vec![2.0, 3.0, 4.5]);
    }
}
