//! Prompt templates and request payloads for the two assistant flows

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::sensor::{SensorReading, VentilationQuality};
use crate::state::ConversationHistory;

pub const SYSTEM_PROMPT: &str = "You are an AI assistant for a project called 'AI-Based Bus Heat Energy Monitoring System.'
Your job is to answer ANY question related to this system. You must:
- Explain bus overheating using physics (conduction, convection, radiation).
- Use the given sensor data (engine temp, cabin temp, coolant level, ventilation quality, outside temp, and camera notes) to assess overheating.
- Diagnose likely causes such as low coolant, blocked ventilation, poor airflow, or very hot weather.
- Always give practical recommendations (slow down, stop bus, check coolant, open vents, improve airflow, etc.).
- Use clear, simple language suitable for school/college students.
- If the user asks about buses, heat, overheating, sensors, AI, physics, safety, fuel efficiency, or this project\u{2019}s design, ALWAYS answer in detail.
- If the question is outside this topic, briefly answer only if you can relate it back to the Bus Heat Energy Monitoring System. Otherwise gently redirect the user back to this topic.
- Whenever possible, explicitly mention conduction, convection and radiation in your explanations, and connect them to what is happening in the bus.";

pub const ANALYZING_PLACEHOLDER: &str = "Analyzing current heat status...";

/// Which flow a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Analyze,
    Ask,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Analyze => "analyzeHeatStatus",
            Flow::Ask => "aiAnswerQuestions",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaField {
    pub name: &'static str,
    pub description: &'static str,
}

/// Output contract of a flow. Every field is a required string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub fields: &'static [SchemaField],
}

impl OutputSchema {
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for field in self.fields {
            properties.insert(
                field.name.to_string(),
                json!({ "type": "string", "description": field.description }),
            );
        }
        let required: Vec<&str> = self.fields.iter().map(|f| f.name).collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Instructions appended to prompts so text-only backends answer in JSON.
    pub fn instructions(&self) -> String {
        let mut out = String::from("Respond with a single JSON object with exactly these string fields:\n");
        for field in self.fields {
            out.push_str(&format!("- \"{}\": {}\n", field.name, field.description));
        }
        out.push_str("Do not include any text outside the JSON object.");
        out
    }

    /// Checks that `value` is an object carrying every field as a string.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let object = value
            .as_object()
            .ok_or_else(|| format!("{} output is not a JSON object", self.name))?;
        for field in self.fields {
            match object.get(field.name) {
                Some(Value::String(_)) => {}
                Some(_) => return Err(format!("field `{}` is not a string", field.name)),
                None => return Err(format!("missing field `{}`", field.name)),
            }
        }
        Ok(())
    }
}

pub const ANALYZE_OUTPUT: OutputSchema = OutputSchema {
    name: "AnalyzeHeatStatusOutput",
    fields: &[
        SchemaField {
            name: "analysis",
            description: "Analysis of the bus heat status, including potential overheating causes.",
        },
        SchemaField {
            name: "suggestions",
            description: "Suggestions for addressing the overheating issue.",
        },
    ],
};

pub const ASK_OUTPUT: OutputSchema = OutputSchema {
    name: "AIAnswerQuestionsOutput",
    fields: &[SchemaField {
        name: "answer",
        description: "The AI chatbot response to the user question.",
    }],
};

/// Structured input of the analyze flow. Outside temperature is not part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeHeatStatusInput {
    pub engine_temperature: f64,
    pub cabin_temperature: f64,
    pub coolant_level: f64,
    pub ventilation_quality: VentilationQuality,
    pub camera_observations: String,
}

impl From<&SensorReading> for AnalyzeHeatStatusInput {
    fn from(reading: &SensorReading) -> Self {
        Self {
            engine_temperature: reading.engine_temperature,
            cabin_temperature: reading.cabin_temperature,
            coolant_level: reading.coolant_level,
            ventilation_quality: reading.ventilation_quality,
            camera_observations: reading.camera_observations.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnalyzeHeatStatusOutput {
    pub analysis: String,
    pub suggestions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerQuestionInput {
    pub question: String,
    pub system_prompt: String,
    pub sensor_data: String,
    pub conversation_history: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AnswerQuestionOutput {
    pub answer: String,
}

/// Everything a completion backend needs for one call.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub flow: Flow,
    /// Fully rendered prompt text.
    pub prompt: String,
    /// The structured input the prompt was rendered from.
    pub input: Value,
    pub schema: OutputSchema,
}

/// `Engine: 90°C, Cabin: 22°C, ...`, the flat sensor string sent with questions.
pub fn sensor_summary(reading: &SensorReading) -> String {
    format!(
        "Engine: {}°C, Cabin: {}°C, Coolant: {}%, Ventilation: {}, Outside: {}°C, Camera: {}",
        reading.engine_temperature,
        reading.cabin_temperature,
        reading.coolant_level,
        reading.ventilation_quality,
        reading.outside_temperature,
        reading.camera_observations,
    )
}

/// One `<role>: <content>` line per message, oldest first.
pub fn transcript(history: &ConversationHistory) -> String {
    history
        .messages()
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn analyze_request(reading: &SensorReading) -> CompletionRequest {
    let input = AnalyzeHeatStatusInput::from(reading);

    let mut prompt = String::from(SYSTEM_PROMPT);
    prompt.push_str("\n\nGiven the following sensor data and camera observations, provide an analysis of the bus's heat status and suggestions to address any issues:\n");
    prompt.push_str(&format!("Engine Temperature: {}°C\n", input.engine_temperature));
    prompt.push_str(&format!("Cabin Temperature: {}°C\n", input.cabin_temperature));
    prompt.push_str(&format!("Coolant Level: {}%\n", input.coolant_level));
    prompt.push_str(&format!("Ventilation Quality: {}\n", input.ventilation_quality));
    prompt.push_str(&format!("Camera Observations: {}\n\n", input.camera_observations));
    prompt.push_str(&ANALYZE_OUTPUT.instructions());

    CompletionRequest {
        flow: Flow::Analyze,
        prompt,
        input: json!(input),
        schema: ANALYZE_OUTPUT,
    }
}

/// `history` must already contain the question as its latest message.
pub fn ask_request(question: &str, reading: &SensorReading, history: &ConversationHistory) -> CompletionRequest {
    let input = AnswerQuestionInput {
        question: question.to_string(),
        system_prompt: SYSTEM_PROMPT.to_string(),
        sensor_data: sensor_summary(reading),
        conversation_history: transcript(history),
    };

    let prompt = format!(
        "{}\nSensor Data: {}\nConversation History: {}\nUser Question: {}\n\n{}",
        input.system_prompt,
        input.sensor_data,
        input.conversation_history,
        input.question,
        ASK_OUTPUT.instructions(),
    );

    CompletionRequest {
        flow: Flow::Ask,
        prompt,
        input: json!(input),
        schema: ASK_OUTPUT,
    }
}

/// Assistant message body for a successful analysis.
pub fn format_analysis(output: &AnalyzeHeatStatusOutput) -> String {
    format!(
        "### Heat Status Analysis\n\n**Analysis:** {}\n\n**Suggestions:** {}",
        output.analysis, output.suggestions
    )
}
