pub struct SampleArticle {
    pub title: &'static str,
    pub text: &'static str,
}

pub const SAMPLE_ARTICLES: &[SampleArticle] = &[
    SampleArticle {
        title: "The Future of Artificial Intelligence",
        text: "Artificial intelligence is changing how people live, work and use technology. \
Voice assistants, recommendation systems and driver-assistance features already rely on \
machine learning, and recent progress in deep learning has pushed these systems into tasks \
that once needed human judgement.\n\n\
Large language models are the most visible example. Trained on enormous collections of text, \
they can draft documents, translate between languages and answer questions conversationally. \
They still make factual mistakes and struggle with multi-step reasoning, which is why careful \
evaluation remains important.\n\n\
Beyond language, AI systems now help radiologists spot disease in medical images, assist \
researchers in predicting protein structures and support engineers designing new materials. \
Self-driving vehicles continue to improve, although deployment is slower than early forecasts \
suggested.\n\n\
These advances raise real concerns about bias, privacy, job displacement and governance. \
Making sure AI systems reflect human values will require cooperation between researchers, \
companies, regulators and the public, so that the benefits are shared widely and the risks \
are managed responsibly.",
    },
    SampleArticle {
        title: "Climate Change and Global Ecosystems",
        text: "Climate change is reshaping ecosystems faster than at any point in recorded history. \
Rising temperatures, shifting rainfall and more frequent extreme weather are disturbing \
ecological balances that developed over thousands of years.\n\n\
Oceans absorb much of the extra heat and carbon dioxide, which warms and acidifies the water. \
Coral reefs, home to roughly a quarter of marine species, are bleaching more often and may \
largely disappear this century without deep cuts in emissions.\n\n\
On land, the Arctic is warming about twice as fast as the global average. Thawing permafrost \
releases stored carbon and alters habitats for caribou and other wildlife. In the tropics, \
drought and deforestation weaken rainforests that store carbon and shelter a large share of \
the planet's biodiversity.\n\n\
Seasonal timing is shifting too: plants flower earlier and migratory birds arrive sooner, \
breaking long-standing links between pollinators and plants or predators and prey. Protecting \
connected habitats, restoring forests and wetlands, and rapidly decarbonising energy systems \
offer a path toward a future where people and nature can both thrive.",
    },
];

pub fn random_sample() -> &'static SampleArticle {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as usize)
        .unwrap_or(0);
    &SAMPLE_ARTICLES[nanos % SAMPLE_ARTICLES.len()]
}
