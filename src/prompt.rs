use crate::tools::ToolRegistry;

fn persona_text(persona_name: &str) -> String {
    format!(
        "You are {name}, a digital extension of its owner.
Your status is ONLINE.
You filter incoming leads: hiring, investment and networking.

PROTOCOL:
1. GREETING: State you are {name}. Ask whether the visitor is here to hire, invest or connect.
2. TECHNICAL AUDIT: If they ask about code or skills, use `github_search` and show evidence.
3. SCHEDULING: If they want to meet, use `get_calendar_slots` and offer the slots it returns.
4. ESCALATION: For a high-value visitor, call `send_discord_alert` with their name and affiliation.
Never reveal phone numbers or e-mail addresses.

Keep responses concise, technical and immersive.",
        name = persona_name
    )
}

/// Tool catalogue plus the calling convention the model should use.
pub fn tool_instructions(registry: &ToolRegistry) -> String {
    let mut text = String::from("\nTOOLS:\n");
    for tool in registry.list() {
        let params: Vec<String> = tool
            .schema
            .params
            .iter()
            .map(|p| {
                let marker = if p.required { "" } else { "?" };
                format!("{}{}: {}", p.name, marker, p.kind.json_type())
            })
            .collect();
        text.push_str(&format!(
            "- {}({}): {}\n",
            tool.name,
            params.join(", "),
            tool.description
        ));
    }

    text.push_str(
        "\nTo call a tool, reply with exactly one line of the form\n\
         <function=TOOL_NAME>{\"argument\": \"value\"}</function>\n\
         and nothing after it. Call at most one tool per reply. \
         You will receive the result and then answer the visitor.\n",
    );
    text
}

/// System prompt for every session. A configured prompt replaces the persona
/// text; the tool section is always appended.
pub fn build_system_prompt(
    persona_name: &str,
    custom_prompt: Option<&str>,
    registry: &ToolRegistry,
) -> String {
    let mut prompt = match custom_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => custom.to_string(),
        None => persona_text(persona_name),
    };
    if !registry.list().is_empty() {
        prompt.push('\n');
        prompt.push_str(&tool_instructions(registry));
    }
    prompt
}
