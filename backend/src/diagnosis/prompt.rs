pub const DEFAULT_PLANT_TYPE: &str = "unknown";

const PROMPT_TEMPLATE: &str = "You are an expert plant pathologist helping a farmer. \
Analyze the attached photo of a {plant_type} plant and write a diagnosis report with these sections:

1. Disease Identification: name the most likely disease or pest, or state that the plant looks healthy.
2. Symptoms Observed: describe the visible signs in the image that support the diagnosis.
3. Causes: explain the pathogen, pest, or environmental condition responsible.
4. Treatment: list organic remedies first, then chemical options with typical dosages.
5. Prevention: give practical steps to stop the problem from returning next season.
6. Severity: rate the severity as Low, Medium, or High and say whether nearby plants are at risk.

Use short paragraphs and bullet points. If the image does not show a plant, say so and skip the other sections.";

pub fn build_prompt(plant_type: &str) -> String {
    PROMPT_TEMPLATE.replace("{plant_type}", plant_type)
}
