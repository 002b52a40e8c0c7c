//! The fixed category taxonomy. Analysis categories and user preferences
//! are always validated against this closed set of slugs.

pub struct Category {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub const CATEGORIES: &[Category] = &[
    Category {
        slug: "generative-ai-models",
        title: "Generative AI Models & Releases",
        description: "Updates on major foundational models, including GPT-4o, Gemini, Claude 3, Llama 3, and Stable Diffusion.",
    },
    Category {
        slug: "ai-tools-applications",
        title: "AI Tools & Applications",
        description: "Practical implementations of AI, such as coding assistants, local LLM runners, text-to-speech engines, and image generation interfaces.",
    },
    Category {
        slug: "programming-languages",
        title: "Programming Languages",
        description: "Discussions on language updates and comparisons, covering Python, Rust, C++, Go, Mojo, and TypeScript.",
    },
    Category {
        slug: "software-engineering-devops",
        title: "Software Engineering & DevOps",
        description: "Topics related to development workflows, version control (Git), databases (Postgres, SQLite), debugging, and system architecture.",
    },
    Category {
        slug: "web-development-browsers",
        title: "Web Development & Browsers",
        description: "News regarding web standards, browser engines (Firefox, Chrome, Ladybird), and frontend technologies like CSS, HTML, and htmx.",
    },
    Category {
        slug: "open-source-community",
        title: "Open Source Community",
        description: "Conversations about project forks (OpenTF, Valkey), maintainer challenges, licensing debates, and community-driven tools.",
    },
    Category {
        slug: "operating-systems",
        title: "Operating Systems",
        description: "Updates on kernels and OS distributions, including Linux, Windows 11, macOS, and niche projects like Asahi Linux or SerenityOS.",
    },
    Category {
        slug: "cybersecurity-incidents",
        title: "Cybersecurity Incidents",
        description: "Reports on major security breaches, backdoors (XZ Utils), data leaks (23andMe), and supply chain attacks.",
    },
    Category {
        slug: "hacking-security-research",
        title: "Hacking & Security Research",
        description: "Technical discussions on exploits, reverse engineering, penetration testing, and security hardware like Flipper Zero.",
    },
    Category {
        slug: "privacy-encryption",
        title: "Privacy & Encryption",
        description: "News regarding surveillance, end-to-end encryption tools (Signal), and privacy regulations like Chat Control.",
    },
    Category {
        slug: "big-tech-corporate-news",
        title: "Big Tech Corporate News",
        description: "Updates on major technology companies, including antitrust lawsuits, board conflicts, and major acquisitions.",
    },
    Category {
        slug: "work-career-management",
        title: "Work, Career & Management",
        description: "Discussions on the tech labor market, return-to-office mandates, layoffs, and hiring practices.",
    },
    Category {
        slug: "startups-venture-capital",
        title: "Startups & Venture Capital",
        description: "Stories about founder experiences, fundraising, Y Combinator, and the startup ecosystem.",
    },
    Category {
        slug: "media-copyright-content",
        title: "Media, Copyright & Content",
        description: "Debates on digital rights, AI copyright infringement (NYT vs. OpenAI), piracy, and streaming service policies.",
    },
    Category {
        slug: "semiconductors-chips",
        title: "Semiconductors & Chips",
        description: "News on hardware manufacturing and design, covering Apple Silicon, Nvidia GPUs, TSMC, and RISC-V.",
    },
    Category {
        slug: "consumer-electronics",
        title: "Consumer Electronics",
        description: "Launches and discussions of consumer hardware, including smartphones, VR/AR headsets, and Right to Repair initiatives.",
    },
    Category {
        slug: "space-exploration",
        title: "Space Exploration",
        description: "Updates on aerospace missions, including SpaceX Starship, Voyager, the James Webb Telescope, and lunar landings.",
    },
    Category {
        slug: "physics-materials",
        title: "Physics & Materials",
        description: "Scientific breakthroughs and debates, such as the LK-99 superconductor saga, fusion energy, and battery technology.",
    },
    Category {
        slug: "health-biotech-medicine",
        title: "Health, Biotech & Medicine",
        description: "Developments in medical research, gene therapy, mental health studies, and disease eradication.",
    },
    Category {
        slug: "mathematics-theory",
        title: "Mathematics & Theory",
        description: "Discussions on algorithmic breakthroughs, mathematical puzzles, scientific papers, and data visualization.",
    },
    Category {
        slug: "law-policy-regulation",
        title: "Law, Policy & Regulation",
        description: "News on government legislation affecting tech, such as the EU AI Act, FCC rulings, and Net Neutrality.",
    },
    Category {
        slug: "geopolitics-global-affairs",
        title: "Geopolitics & Global Affairs",
        description: "Discussions on how international conflicts, sanctions, and government censorship intersect with technology.",
    },
    Category {
        slug: "transportation-infrastructure",
        title: "Transportation & Infrastructure",
        description: "Reports on vehicle safety (Boeing), electric vehicle adoption, and public infrastructure projects.",
    },
    Category {
        slug: "environment-energy",
        title: "Environment & Energy",
        description: "Topics concerning climate change, renewable energy sources, and nuclear power developments.",
    },
    Category {
        slug: "obituaries",
        title: "Obituaries",
        description: "Tributes to recently deceased notable figures in the tech and science communities.",
    },
    Category {
        slug: "gaming-game-dev",
        title: "Gaming & Game Dev",
        description: "News on game engines (Unity, Godot), game development culture, and retro gaming ports.",
    },
    Category {
        slug: "graphics-design-ui-ux",
        title: "Graphics, Design & UI/UX",
        description: "Updates on design tools (Blender), font creation, 3D rendering, and user interface trends.",
    },
    Category {
        slug: "retro-computing-history",
        title: "Retro Computing & History",
        description: "Posts dedicated to vintage hardware restoration, historical codebases, and the history of computing.",
    },
    Category {
        slug: "show-hn-projects",
        title: "\"Show HN\" Projects",
        description: "Community submissions where creators share their own tools, apps, and side projects for feedback.",
    },
    Category {
        slug: "ask-hn-community-meta",
        title: "\"Ask HN\" & Community Meta",
        description: "Internal community discussions, including technical questions, career advice, and site announcements.",
    },
];

pub fn is_valid_slug(slug: &str) -> bool {
    CATEGORIES.iter().any(|c| c.slug == slug)
}

pub fn find(slug: &str) -> Option<&'static Category> {
    CATEGORIES.iter().find(|c| c.slug == slug)
}

/// Keep only slugs that belong to the taxonomy, preserving input order and
/// dropping duplicates.
pub fn sanitize_slugs<I, S>(slugs: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for slug in slugs {
        let slug = slug.as_ref().trim();
        if is_valid_slug(slug) && !out.iter().any(|s| s == slug) {
            out.push(slug.to_string());
        }
    }
    out
}

/// The taxonomy rendered as "(slug, description)" lines for prompt building.
pub fn prompt_listing() -> String {
    CATEGORIES
        .iter()
        .map(|c| format!("({}, {})", c.slug, c.description))
        .collect::<Vec<_>>()
        .join("\n")
}
