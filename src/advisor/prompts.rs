//! Canned system instructions and the keyword router that picks one for `/ask_gemini`.

use serde_json::{Value, json};

/// Query used for roadmap generation when the caller sends none.
pub const DEFAULT_ROADMAP_QUERY: &str =
    "Suggest a personalized learning and career roadmap in tech.";

/// Instruction for `/generate_roadmap`; node ids 1-15 map onto the frontend flowchart.
pub const ROADMAP_INSTRUCTION: &str = "\
You are a helpful career and education advisor for a user in Cebu City, Philippines.
Your task is to populate a flowchart with a personalized roadmap based on the provided data.

You have been provided with:
1. A list of current node IDs and their existing labels in a flowchart structure.
2. Relevant data from a database (RAG results) containing information about schools and programs in Cebu.

Use the RAG data to inform the 'PROGRAM' (id: 1) node, ensuring it is specific to a school found in the database if possible.

Generate relevant and specific labels for EACH node ID (1 through 15) in the provided list.

* For 'PROGRAM' (id: 1), suggest a STEM related field or course that is found in the database.
* For 'RESOURCES' (id: 2), do not change the label. Its label must be exactly \"RESOURCES\".
* For 'COLLEGES' (id: 3), do not change the label. Its label must be exactly \"COLLEGES\".
* For nodes with id 4-9, fill them with resources found in the database that are related to the program suggested in id: 1.
* For nodes with id 10-12, provide schools found in the database that offer the program suggested in id: 1.
* Fill the remaining nodes (13-15) with information about the schools in nodes 10-12 respectively.

Return the response ONLY as a JSON array of objects with 'id' and 'newLabel' for all nodes (1-15).";

const SCHOLARSHIP_INSTRUCTION: &str = "\
You are a scholarship advisor for students in Cebu, Philippines.
You are given the user's question and a list of JSON metadata records about schools and the programs they offer.
Each record has the keys school_id, program_id, institution_name, institution_type, province, municipality, program_name, resource_name, resource_link, resource_types and dost_eligibility.

Answer using only these records:
* List the schools relevant to the question and state, for each, whether it is DOST scholarship eligible according to dost_eligibility.
* Mention the program_name when the question is about a specific field.
* Treat the value \"N/A\" as unknown and say so instead of guessing.
* Do not invent scholarships, schools or eligibility rules that are not in the records.

Keep the answer concise and formatted as a short list.";

const RESOURCE_INSTRUCTION: &str = "\
You are a study coach helping a student in Cebu, Philippines prepare for a college program.
You are given the user's question and a list of JSON metadata records about programs and their online learning resources.
Each record has the keys program_name, resource_name, resource_link and resource_types, among others.

Answer using only these records:
* Recommend the online resources whose program_name matches the question, with their resource_name, resource_types and resource_link.
* Skip records whose resource_name is \"N/A\".
* List each resource once even if several records repeat it.
* Do not invent links.

Keep the answer concise and formatted as a short list.";

const INSTITUTION_INSTRUCTION: &str = "\
You are a helpful career and education advisor for a user in Cebu, Philippines.
You are given the user's question and a list of short descriptions of schools and the programs they offer, retrieved from a database.

Answer using only these descriptions:
* List the schools that match the question, with their type, location and the relevant program.
* Include the school's website when the description has one other than \"N/A\".
* List each school once.
* If nothing in the descriptions matches, say that no matching school was found.

Keep the answer concise and formatted as a short list.";

/// Which retrieved field a prompt reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// Synthesized document sentences.
    Documents,
    /// Flat metadata records.
    Metadatas,
}

/// Prompt families available to `/ask_gemini`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    /// Scholarship eligibility extraction over metadata.
    Scholarship,
    /// Online resource extraction over metadata.
    Resource,
    /// Institution listing over documents.
    Institution,
}

impl PromptKind {
    /// Pick a prompt by substring match on the lowercased query; first match wins.
    ///
    /// This is a heuristic: a query mentioning both scholarships and resources is routed to
    /// the scholarship prompt.
    pub fn classify(query: &str) -> Self {
        let query = query.to_lowercase();
        if query.contains("scholarship") {
            Self::Scholarship
        } else if ["resource", "prepare", "link"]
            .iter()
            .any(|keyword| query.contains(keyword))
        {
            Self::Resource
        } else {
            Self::Institution
        }
    }

    /// System instruction sent with the query.
    pub fn instruction(self) -> &'static str {
        match self {
            Self::Scholarship => SCHOLARSHIP_INSTRUCTION,
            Self::Resource => RESOURCE_INSTRUCTION,
            Self::Institution => INSTITUTION_INSTRUCTION,
        }
    }

    /// Retrieved field serialized into the prompt context.
    pub fn context_source(self) -> ContextSource {
        match self {
            Self::Scholarship | Self::Resource => ContextSource::Metadatas,
            Self::Institution => ContextSource::Documents,
        }
    }

    /// Short name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scholarship => "scholarship",
            Self::Resource => "resource",
            Self::Institution => "institution",
        }
    }
}

/// Structured-output schema for roadmap labels: an array of `{id, newLabel}` strings.
pub fn roadmap_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "newLabel": { "type": "STRING" }
            },
            "required": ["id", "newLabel"]
        }
    })
}
