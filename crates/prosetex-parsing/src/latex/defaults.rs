//! Built-in command and environment signatures.
//!
//! This is a curated subset of the commands of common document classes
//! and packages (hyperref, biblatex, natbib, graphicx, todonotes, tikz).
//! User settings extend the list at runtime.

use crate::dummy::DummyGenerator;
use crate::latex::signature::{Action, CommandSignature, EnvironmentSignature};

const IGNORE_COMMANDS: &[&str] = &[
    "\\addbibresource{}",
    "\\addtocounter{}{}",
    "\\addtolength{}{}",
    "\\bibitem{}",
    "\\bibliography{}",
    "\\bibliographystyle{}",
    "\\captionof{}",
    "\\captionsetup{}",
    "\\captionsetup[]{}",
    "\\cline{}",
    "\\color{}",
    "\\color[]{}",
    "\\colorbox{}",
    "\\columncolor{}",
    "\\crefname{}{}{}",
    "\\Crefname{}{}{}",
    "\\DeclareMathOperator{}{}",
    "\\DeclareMathOperator*{}{}",
    "\\definecolor{}{}{}",
    "\\documentclass{}",
    "\\documentclass[]{}",
    "\\footnote{}",
    "\\footnote[]{}",
    "\\footnotemark",
    "\\footnotemark[]",
    "\\geometry{}",
    "\\graphicspath{}",
    "\\hyperref[]",
    "\\hypersetup{}",
    "\\hyphenation{}",
    "\\include{}",
    "\\includegraphics{}",
    "\\includegraphics[]{}",
    "\\input{}",
    "\\label{}",
    "\\linespread{}",
    "\\multicolumn{}{}",
    "\\multirow{}{}",
    "\\newcommand{}{}",
    "\\newcommand{}[]{}",
    "\\newcommand*{}{}",
    "\\newcommand*{}[]{}",
    "\\newcounter{}",
    "\\newenvironment{}{}{}",
    "\\newtheorem{}{}",
    "\\nocite{}",
    "\\pagenumbering{}",
    "\\pagestyle{}",
    "\\printbibliography",
    "\\printbibliography[]",
    "\\providecommand{}{}",
    "\\providecommand{}[]{}",
    "\\raisebox{}",
    "\\renewcommand{}{}",
    "\\renewcommand{}[]{}",
    "\\renewcommand*{}{}",
    "\\renewcommand*{}[]{}",
    "\\renewenvironment{}{}{}",
    "\\RequirePackage{}",
    "\\RequirePackage[]{}",
    "\\rowcolor{}",
    "\\selectlanguage{}",
    "\\setcounter{}{}",
    "\\setkomafont{}{}",
    "\\setlength{}{}",
    "\\stepcounter{}",
    "\\thispagestyle{}",
    "\\tikzset{}",
    "\\todo{}",
    "\\todo[]{}",
    "\\usepackage{}",
    "\\usepackage[]{}",
    "\\usetikzlibrary{}",
    "\\vspace{}",
    "\\vspace*{}",
];

const DUMMY_COMMANDS: &[&str] = &[
    "\\autocite{}",
    "\\autocite[]{}",
    "\\autocite[][]{}",
    "\\autocite*{}",
    "\\autocite*[]{}",
    "\\Autocite{}",
    "\\Autocite[]{}",
    "\\autoref{}",
    "\\autoref*{}",
    "\\cite{}",
    "\\cite[]{}",
    "\\cite[][]{}",
    "\\Cite{}",
    "\\Cite[]{}",
    "\\citealp{}",
    "\\citealp[]{}",
    "\\citealt{}",
    "\\citealt[]{}",
    "\\citeauthor{}",
    "\\citeauthor[]{}",
    "\\citeauthor*{}",
    "\\Citeauthor{}",
    "\\citedate{}",
    "\\citedate[]{}",
    "\\citep{}",
    "\\citep[]{}",
    "\\citet{}",
    "\\citet[]{}",
    "\\citetitle{}",
    "\\citetitle[]{}",
    "\\citeurl{}",
    "\\citeyear{}",
    "\\citeyearpar{}",
    "\\cref{}",
    "\\Cref{}",
    "\\email{}",
    "\\eqref{}",
    "\\footcite{}",
    "\\footcite[]{}",
    "\\foreignlanguage{}{}",
    "\\foreignlanguage[]{}{}",
    "\\href{}{}",
    "\\LaTeX",
    "\\nolinkurl{}",
    "\\pageref{}",
    "\\pageref*{}",
    "\\parencite{}",
    "\\parencite[]{}",
    "\\parencite[][]{}",
    "\\ref{}",
    "\\ref*{}",
    "\\TeX",
    "\\textcite{}",
    "\\textcite[]{}",
    "\\textcite[][]{}",
    "\\url{}",
];

const PLURAL_DUMMY_COMMANDS: &[&str] = &[
    "\\autocites{}",
    "\\autocites{}{}",
    "\\autocites{}{}{}",
    "\\cites{}",
    "\\cites{}{}",
    "\\cites{}{}{}",
    "\\textcites{}",
    "\\textcites{}{}",
    "\\textcites{}{}{}",
];

const IGNORE_ENVIRONMENTS: &[&str] = &[
    "comment",
    "lstlisting",
    "minted",
    "tikzpicture",
    "verbatim",
];

const IGNORE_ENVIRONMENT_PROTOTYPES: &[&str] = &[
    "\\begin{otherlanguage}{}",
    "\\begin{otherlanguage*}{}",
];

/// The built-in command signatures.
pub fn command_signatures() -> Vec<CommandSignature> {
    let mut signatures = Vec::new();
    for prototype in IGNORE_COMMANDS {
        signatures.extend(CommandSignature::new(prototype, Action::Ignore));
    }
    for prototype in DUMMY_COMMANDS {
        signatures.extend(CommandSignature::new(prototype, Action::Dummy));
    }
    for prototype in PLURAL_DUMMY_COMMANDS {
        signatures.extend(CommandSignature::with_generator(
            prototype,
            Action::Dummy,
            DummyGenerator::new_plural(),
        ));
    }
    signatures
}

/// The built-in environment signatures.
pub fn environment_signatures() -> Vec<EnvironmentSignature> {
    let mut signatures = Vec::new();
    for name in IGNORE_ENVIRONMENTS {
        signatures.extend(EnvironmentSignature::new(name, Action::Ignore));
    }
    for prototype in IGNORE_ENVIRONMENT_PROTOTYPES {
        signatures.extend(EnvironmentSignature::new(prototype, Action::Ignore));
    }
    signatures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_default_prototypes_are_valid() {
        let command_count = IGNORE_COMMANDS.len() + DUMMY_COMMANDS.len() + PLURAL_DUMMY_COMMANDS.len();
        assert_eq!(command_signatures().len(), command_count);

        let environment_count = IGNORE_ENVIRONMENTS.len() + IGNORE_ENVIRONMENT_PROTOTYPES.len();
        assert_eq!(environment_signatures().len(), environment_count);
    }

    #[test]
    fn test_cite_variants_share_prefix() {
        let variants = command_signatures()
            .iter()
            .filter(|signature| signature.prefix == "\\cite")
            .count();
        assert!(variants >= 3);
    }
}
