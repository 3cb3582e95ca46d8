//! Prompt template library.
//!
//! Template text is data, not logic: everything here is a static string with
//! named `{placeholder}` slots plus a couple of small helpers to fill them.
//! Lookups by stage or section name fall back to a sensible default so an
//! unknown key never breaks a call site.

use serde_json::{Map, Value};

/// System preamble installed as the first message of every session.
pub const SYSTEM_ROLE: &str = "You are a seasoned academic writing expert with many years of \
research and supervision experience. Your task is to help researchers write high-quality \
academic papers that are rigorous, scholarly, and innovative. You are skilled at guiding \
users to provide detailed information and at turning that information into well-structured, \
clearly argued papers.";

const COLLECTION_INITIAL: &str = "As an academic writing expert, I will help you write a \
high-quality paper.\n\nTo get started, I need a few basics:\n\n\
1. **Research topic**: what problem or field does your research focus on?\n\
2. **Research background**: why this topic? What is its practical significance?\n\
3. **Research objective**: what do you hope to achieve with this study?\n\
4. **Target journal/conference**: where do you plan to submit? (This helps me match \
formatting expectations.)\n\n\
Please answer briefly and I will guide you from there.";

const COLLECTION_RESEARCH_BACKGROUND: &str = "Thanks for the information. Let's dig into the \
research background:\n\n\
1. **Theoretical basis**: which theories or conceptual frameworks underpin your study?\n\
2. **Prior work**: what are the important existing results in this area?\n\
3. **Research gap**: what do existing studies leave unanswered?\n\
4. **Research question**: what specific problem does your study address?\n\n\
Detailed background will make the introduction far more persuasive.";

const COLLECTION_METHODOLOGY: &str = "Next, let's discuss the research method:\n\n\
1. **Research design**: what design do you use (experiment, case study, survey, ...)?\n\
2. **Data source**: where does the data come from? How large is the sample?\n\
3. **Data collection**: how is the data collected (questionnaire, interview, observation, \
experiment, ...)?\n\
4. **Analysis method**: how is the data analyzed (statistics, content analysis, modeling, ...)?\n\
5. **Tools**: which software or instruments were used?\n\n\
A clear methodology section is critical for credibility.";

const COLLECTION_RESULTS: &str = "Now let's focus on the research results:\n\n\
1. **Main findings**: what are the key findings or conclusions?\n\
2. **Data presentation**: what data, tables, or statistics need to be shown?\n\
3. **Key indicators**: which quantitative or qualitative indicators matter most?\n\
4. **Unexpected findings**: anything surprising but valuable?\n\n\
Please describe your results in as much concrete detail as you can.";

const COLLECTION_DISCUSSION: &str = "Let's work out what the results mean:\n\n\
1. **Interpretation**: how do you explain the findings? Why these results?\n\
2. **Theoretical contribution**: what do they add to, or challenge in, existing theory?\n\
3. **Practical implications**: what guidance do they offer practitioners?\n\
4. **Limitations**: what are the study's limitations?\n\
5. **Future directions**: what should follow-up research explore?\n\n\
This discussion gives the paper its depth.";

const COLLECTION_LITERATURE_REVIEW: &str = "Let's complete the literature review:\n\n\
1. **Core literature**: which classic works must be cited in this area?\n\
2. **Recent work**: which important studies appeared in the last 3-5 years?\n\
3. **Theoretical framework**: which frameworks do you adopt or reference?\n\
4. **Schools of thought**: what distinct research perspectives exist here?\n\
5. **Critical view**: what is your critical take on the existing work?\n\n\
A thorough review demonstrates command of the field.";

/// Guidance prompt for one information-collection stage.
///
/// Unknown stage names fall back to the initial guidance, matching the
/// tolerant lookup the rest of the crate expects from template data.
pub fn information_collection_prompt(stage: &str) -> &'static str {
    match stage {
        "research_background" => COLLECTION_RESEARCH_BACKGROUND,
        "methodology" => COLLECTION_METHODOLOGY,
        "results" => COLLECTION_RESULTS,
        "discussion" => COLLECTION_DISCUSSION,
        "literature_review" => COLLECTION_LITERATURE_REVIEW,
        _ => COLLECTION_INITIAL,
    }
}

const GENERATION_ABSTRACT: &str = "Based on the research information below, write the paper's \
abstract:\n\n{collected_info}\n\nRequirements:\n\
1. Cover background, objective, method, and main findings\n\
2. 200-300 words\n\
3. Formal academic register\n\
4. Emphasize novelty and importance\n\
5. Avoid first person\n\nWrite the abstract:";

const GENERATION_INTRODUCTION: &str = "Based on the research information below, write the \
paper's introduction:\n\n{collected_info}\n\nRequirements:\n\
1. Open with the broad context and narrow to the specific research problem\n\
2. Argue the importance and necessity of the study\n\
3. Briefly survey related work\n\
4. State the research question and objectives explicitly\n\
5. Outline the structure of the paper\n\
6. 1000-1500 words, academic register, clear logic\n\nWrite the introduction:";

const GENERATION_LITERATURE_REVIEW: &str = "Based on the research information below, write the \
paper's literature review:\n\n{collected_info}\n\nRequirements:\n\
1. Survey the field systematically\n\
2. Organize by theme or chronology\n\
3. Analyze critically rather than merely listing sources\n\
4. Identify shortcomings and gaps in existing work\n\
5. Build the case for the present study\n\
6. 2000-3000 words, rigorous citation practice\n\nWrite the literature review:";

const GENERATION_METHODOLOGY: &str = "Based on the research information below, write the \
paper's methodology section:\n\n{collected_info}\n\nRequirements:\n\
1. Describe the research design and procedure in detail\n\
2. State the data source, sampling, and sample size\n\
3. Explain the collection methods and instruments\n\
4. Explain the analysis methods and techniques\n\
5. Address reliability and validity measures\n\
6. 1500-2000 words, precise and reproducible\n\nWrite the methodology:";

const GENERATION_RESULTS: &str = "Based on the research information below, write the paper's \
results section:\n\n{collected_info}\n\nRequirements:\n\
1. Present findings objectively without interpretation\n\
2. Describe tables and figures in prose\n\
3. Order the results logically\n\
4. Highlight the key findings and figures\n\
5. 2000-3000 words\n\
6. Leave discussion and explanation to the next section\n\nWrite the results:";

const GENERATION_DISCUSSION: &str = "Based on the research information below, write the \
paper's discussion section:\n\n{collected_info}\n\nRequirements:\n\
1. Interpret the findings in depth\n\
2. Compare the results with prior literature\n\
3. State the theoretical and practical contributions\n\
4. Analyze the limitations objectively\n\
5. Propose directions for future research\n\
6. 1500-2000 words, rigorous argumentation\n\nWrite the discussion:";

const GENERATION_CONCLUSION: &str = "Based on the research information below, write the \
paper's conclusion:\n\n{collected_info}\n\nRequirements:\n\
1. Summarize the main findings\n\
2. Emphasize the contribution and value of the study\n\
3. Note the limitations briefly\n\
4. Point to future work\n\
5. Echo the introduction\n\
6. 500-800 words, concise and definite\n\nWrite the conclusion:";

const GENERATION_DEFAULT: &str = "Based on the research information below, write the \
{section} section of the paper:\n\n{collected_info}\n\n\
Use formal academic language and organize the content clearly.\n\nWrite the section:";

/// Generation template for one paper section; `{collected_info}` slot.
pub fn content_generation_template(section: &str) -> &'static str {
    match section {
        "abstract" => GENERATION_ABSTRACT,
        "introduction" => GENERATION_INTRODUCTION,
        "literature_review" => GENERATION_LITERATURE_REVIEW,
        "methodology" => GENERATION_METHODOLOGY,
        "results" => GENERATION_RESULTS,
        "discussion" => GENERATION_DISCUSSION,
        "conclusion" => GENERATION_CONCLUSION,
        _ => GENERATION_DEFAULT,
    }
}

/// Review instruction; `{content}` slot.
pub const QUALITY_REVIEW: &str = "As a strict academic reviewer, assess the following paper \
content:\n\n{content}\n\nReview along these dimensions:\n\n\
1. **Scholarly register**: is the language academic? Any colloquialisms?\n\
2. **Logical rigor**: is the argument clear and internally consistent?\n\
3. **Completeness**: does it cover everything this section should?\n\
4. **Novelty**: does it bring out the study's contribution?\n\
5. **Readability**: is it clearly expressed and sensibly structured?\n\
6. **Specific issues**: point out concrete problems to fix\n\n\
Provide detailed review comments and revision advice:";

/// Structure-optimization instruction; `{content}` slot.
pub const STRUCTURE_OPTIMIZATION: &str = "As a paper-structure expert, optimize the structure \
and organization of the following content:\n\n{content}\n\nOptimize along these lines:\n\n\
1. **Paragraphing**: are paragraphs divided sensibly? Should any be regrouped?\n\
2. **Logical flow**: is the order of presentation the best one?\n\
3. **Transitions**: do paragraphs and parts connect naturally?\n\
4. **Emphasis**: are the key points prominent?\n\
5. **Redundancy**: is there repeated or superfluous content to cut?\n\n\
Provide the optimized content or concrete optimization advice:";

/// Composite improvement instruction used between loop iterations;
/// `{content}`, `{review}`, and `{optimization}` slots.
pub const IMPROVEMENT: &str = "Improve the content below using the review comments and \
optimization advice.\n\nOriginal content:\n{content}\n\nReview comments:\n{review}\n\n\
Optimization advice:\n{optimization}\n\nWrite the improved version:";

/// Collector-role working prompt; `{collected_info}` and `{current_stage}` slots.
pub const COLLECTOR_PROMPT: &str = "You are an information-collection expert. Your job:\n\
1. Analyze the information gathered so far and identify what is missing\n\
2. Design targeted questions that draw out more detail from the user\n\
3. Judge how complete and sufficient the information is\n\n\
Information collected so far:\n{collected_info}\n\n\
Current stage: {current_stage}\n\n\
Analyze what still needs to be collected and ask 3-5 guiding questions:";

/// Notice appended when enough information has been gathered and full-paper
/// generation is about to start.
pub const GENERATION_NOTICE: &str = "Excellent. I have gathered enough information and will \
now generate your paper.\n\nThe process covers these steps:\n\
1. Abstract\n2. Introduction\n3. Literature Review\n4. Methodology\n5. Results\n\
6. Discussion\n7. Conclusion\n\nThis can take a few minutes; please wait...";

/// Notice appended once the full paper has been generated.
pub const COMPLETION_NOTICE: &str = "Your paper has been generated. You can now:\n\n\
1. Export the paper\n2. Keep revising a particular part\n3. Regenerate a single section\n\n\
Tell me what you would like to do.";

/// Prompt asking the user to fill specific gaps or proceed anyway;
/// `{missing}` slot.
pub const MISSING_INFO_PROMPT: &str = "Thank you for the details so far! A few key pieces are \
still missing for a complete paper:\n\nMissing information: {missing}\n\n\
You can either add the missing pieces, or we can proceed with what we have. Would you \
like to:\n\n1. Provide the missing information\n2. Generate the paper from the current \
information\n\nChoose an option or simply supply the additional details.";

/// Fill `{name}` slots in a template. Replacement is literal, so braces that
/// are part of the template text (for example JSON examples) survive.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// Render collected information as `**key**: value` lines for embedding in
/// prompts. Empty or falsy values are skipped.
pub fn format_collected_info(collected_info: &Map<String, Value>) -> String {
    let mut lines = Vec::new();
    for (key, value) in collected_info {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        if !text.is_empty() {
            lines.push(format!("**{}**: {}", key, text));
        }
    }
    if lines.is_empty() {
        "No information collected yet.".to_string()
    } else {
        lines.join("\n")
    }
}

/// Stage guidance plus a summary of what the user already provided.
pub fn build_information_collection_message(
    stage: &str,
    collected_info: &Map<String, Value>,
) -> String {
    let base = information_collection_prompt(stage);
    let has_content = collected_info.values().any(|value| match value {
        Value::String(s) => !s.trim().is_empty(),
        Value::Null => false,
        _ => true,
    });
    if has_content {
        format!(
            "{}\n\n**Information you have provided so far:**\n{}",
            base,
            format_collected_info(collected_info)
        )
    } else {
        base.to_string()
    }
}
